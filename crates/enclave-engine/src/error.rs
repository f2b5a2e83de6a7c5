//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: enclave_core::config::ConfigError,
    },

    /// The geography or agent split failed.
    #[error("partition error: {source}")]
    Partition {
        /// The underlying partition error.
        #[from]
        source: enclave_partition::PartitionError,
    },

    /// The simulation run failed.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: enclave_core::runner::RunError,
    },

    /// Seed population generation failed.
    #[error("spawner error: {message}")]
    Spawner {
        /// Description of the spawner failure.
        message: String,
    },
}
