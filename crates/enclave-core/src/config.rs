//! Configuration loading and typed config structures for a simulation run.
//!
//! The canonical configuration lives in `enclave-config.yaml` at the
//! project root. This module defines strongly-typed structs mirroring the
//! YAML structure and a loader that reads and validates the file. Every
//! field has a default, so a missing file or a partial one still yields a
//! runnable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use enclave_types::PartitionStrategy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its valid domain.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What constraint the value violated.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `enclave-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed).
    #[serde(default)]
    pub world: WorldConfig,

    /// Segregation-model parameters.
    #[serde(default)]
    pub model: ModelConfig,

    /// Run-shape parameters (workers, rounds, deadline).
    #[serde(default)]
    pub run: RunConfig,

    /// Partition strategy selection.
    #[serde(default)]
    pub partitioning: PartitioningConfig,

    /// Durable output locations.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is outside its domain.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value's domain.
    ///
    /// Partition-strategy splits are deterministic, so a bad value here
    /// would fail identically on retry; rejecting at load time is the
    /// only useful moment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.model.spacing.is_finite() && self.model.spacing > 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("model.spacing must be positive, got {}", self.model.spacing),
            });
        }
        let threshold = self.model.similarity_threshold;
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "model.similarity_threshold must be within [0, 1], got {threshold}"
                ),
            });
        }
        if self.run.workers == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("run.workers must be at least 1"),
            });
        }
        if self.run.iterations == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("run.iterations must be at least 1"),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable run name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
        }
    }
}

/// Segregation-model parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Grid cell size used when the population was generated. Neighbor
    /// discovery connects houses within `2 * spacing`, which captures the
    /// 8-neighborhood of a regular grid regardless of minor jitter.
    #[serde(default = "default_spacing")]
    pub spacing: f64,

    /// Minimum same-race neighbor fraction an agent tolerates.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            spacing: default_spacing(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Run-shape parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of worker partitions (the coordinator is not counted).
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Number of synchronous rounds to drive.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Per-round, per-worker deadline in seconds. Unset disables the
    /// deadline entirely.
    #[serde(default)]
    pub worker_timeout_seconds: Option<u64>,
}

impl RunConfig {
    /// The per-worker deadline as a [`Duration`], if configured.
    #[must_use]
    pub const fn worker_deadline(&self) -> Option<Duration> {
        match self.worker_timeout_seconds {
            Some(seconds) => Some(Duration::from_secs(seconds)),
            None => None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            iterations: default_iterations(),
            worker_timeout_seconds: None,
        }
    }
}

/// Partition strategy selection, independently chosen for the one-time
/// geography split and for each round's agent repartitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PartitioningConfig {
    /// Strategy for the initial study-area split.
    #[serde(default = "default_strategy")]
    pub shape_strategy: PartitionStrategy,

    /// Strategy for re-tagging agents after every relocation.
    #[serde(default = "default_strategy")]
    pub agent_strategy: PartitionStrategy,
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            shape_strategy: default_strategy(),
            agent_strategy: default_strategy(),
        }
    }
}

/// Durable output locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Root directory for checkpoint and history files. The store nests
    /// runs under `<shape>/<agent>/workers-<P>/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_world_name() -> String {
    String::from("enclave")
}

const fn default_seed() -> u64 {
    42
}

const fn default_spacing() -> f64 {
    0.1
}

const fn default_similarity_threshold() -> f64 {
    0.3
}

const fn default_workers() -> u32 {
    7
}

const fn default_iterations() -> u32 {
    10
}

const fn default_strategy() -> PartitionStrategy {
    PartitionStrategy::Hilbert
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
