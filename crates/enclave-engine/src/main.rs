//! Engine binary for the Enclave segregation simulator.
//!
//! Wires together the geography split, seed population, and the round
//! loop. It loads configuration, initializes all subsystems, and drives
//! the simulation to completion.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `enclave-config.yaml`
//! 3. Split the study region into worker territories (shape strategy)
//! 4. Populate every territory with seed houses
//! 5. Split the population into worker slots (agent strategy)
//! 6. Run the round loop
//! 7. Log the result

mod error;
mod spawner;

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use enclave_core::config::SimulationConfig;
use enclave_core::runner::{self, RoundCallback, RoundSummary};
use enclave_partition::{chunk_by_partition, partition_points, partition_shapes};
use enclave_types::House;

use crate::error::EngineError;
use crate::spawner::PopulationConfig;

/// Tracks the unsatisfied-agent trend so the shutdown log can show how
/// far the model settled.
struct ConvergenceCallback {
    /// Unsatisfied count per completed round.
    unsatisfied: Vec<usize>,
}

impl RoundCallback for ConvergenceCallback {
    fn on_round(&mut self, summary: &RoundSummary) {
        self.unsatisfied.push(summary.unsatisfied_agents);
    }
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("enclave-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        workers = config.run.workers,
        iterations = config.run.iterations,
        spacing = config.model.spacing,
        similarity_threshold = config.model.similarity_threshold,
        "Configuration loaded"
    );

    let population = load_population_config()?;
    population.validate()?;
    info!(
        empty_ratio = population.empty_ratio,
        demographic_ratio = population.demographic_ratio,
        region_parts = population.region.len(),
        "Population configuration loaded"
    );

    let mut rng = SmallRng::seed_from_u64(config.world.seed);
    let workers = config.run.workers;

    // 3. Split the study region into worker territories.
    let region = population.region_polygons()?;
    let territories = partition_shapes(&region, workers, config.partitioning.shape_strategy)?;
    info!(
        territories = territories.len(),
        shape_strategy = %config.partitioning.shape_strategy,
        "Study region split"
    );

    // 4. Populate every territory with seed houses.
    let mut houses: Vec<House> = Vec::new();
    for territory in &territories {
        let populated =
            spawner::populate_territory(&territory.pieces, config.model.spacing, &population, &mut rng)?;
        houses.extend(populated);
    }
    let occupied = houses.iter().filter(|h| h.is_occupied()).count();
    info!(
        cells = houses.len(),
        occupied,
        "Seed population generated"
    );

    // 5. Split the population into worker slots.
    let tags = partition_points(&houses, workers, config.partitioning.agent_strategy)?;
    let slots = chunk_by_partition(&houses, &tags, workers);
    info!(
        agent_strategy = %config.partitioning.agent_strategy,
        "Seed population partitioned"
    );

    // 6. Run the round loop.
    let mut callback = ConvergenceCallback {
        unsatisfied: Vec::new(),
    };
    let result = runner::run_simulation(slots, &config, &mut callback).await?;

    // 7. Log the result.
    runner::log_run_end(&result);
    info!(
        initial_unsatisfied = callback.unsatisfied.first(),
        final_unsatisfied = callback.unsatisfied.last(),
        "enclave-engine shutdown complete"
    );

    Ok(())
}

/// Load the main simulation configuration from `enclave-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new("enclave-config.yaml");
    if config_path.exists() {
        let config = SimulationConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}

/// Load the spawner configuration from `enclave-config.yaml`.
///
/// Reads the `population` section from the YAML config file. If the file
/// does not exist or lacks the `population` key, defaults are used.
fn load_population_config() -> Result<PopulationConfig, EngineError> {
    let config_path = Path::new("enclave-config.yaml");
    if !config_path.exists() {
        return Ok(PopulationConfig::default());
    }
    let contents = std::fs::read_to_string(config_path).map_err(|e| EngineError::Spawner {
        message: format!("failed to read config file: {e}"),
    })?;

    // Parse the full YAML and extract just the "population" section.
    let raw: serde_yml::Value = serde_yml::from_str(&contents).map_err(|e| EngineError::Spawner {
        message: format!("failed to parse config YAML: {e}"),
    })?;

    raw.get("population").map_or_else(
        || Ok(PopulationConfig::default()),
        |section| {
            serde_yml::from_value(section.clone()).map_err(|e| EngineError::Spawner {
                message: format!("failed to parse population config: {e}"),
            })
        },
    )
}
