//! Round orchestration, local simulation, and relocation for the Enclave
//! segregation simulator -- a geographic variant of Schelling's model run
//! over partitioned house sets.
//!
//! One coordinator drives a fixed set of worker tasks through synchronous
//! rounds. Each round: the coordinator scatters the relocated houses,
//! every worker rebuilds its neighbor graph and evaluates satisfaction,
//! the coordinator gathers the results under a per-worker deadline,
//! verifies conservation, writes a checkpoint, and relocates every
//! unsatisfied agent into a uniformly random empty house for the next
//! round.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration loading and validation
//! - [`neighbors`] -- uniform-grid spatial proximity index
//! - [`sim`] -- per-worker local simulation state
//! - [`redistribute`] -- the global relocation ("move") step
//! - [`conservation`] -- round-barrier conservation verification
//! - [`checkpoint`] -- durable checkpoint and history output
//! - [`worker`] -- worker tasks and their command surface
//! - [`monitor`] -- deadline-bound gather of worker reports
//! - [`runner`] -- the round loop driving a whole run

pub mod checkpoint;
pub mod config;
pub mod conservation;
pub mod monitor;
pub mod neighbors;
pub mod redistribute;
pub mod runner;
pub mod sim;
pub mod worker;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use config::{ConfigError, SimulationConfig};
pub use conservation::{ConservationAnomaly, ConservationResult};
pub use redistribute::{Relocation, relocate};
pub use runner::{NoOpCallback, RoundCallback, RoundSummary, RunError, RunResult, run_simulation};
pub use sim::{LocalSimulation, RoundHarvest, SimulationError, SimulationParams};
