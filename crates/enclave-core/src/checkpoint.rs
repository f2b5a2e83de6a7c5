//! Durable checkpoint and history output.
//!
//! The coordinator is the only writer. Each round overwrites one
//! `checkpoint.json` (the latest complete round is always recoverable);
//! the full `history.json` -- one `all_houses` snapshot per round -- is
//! written once when the run finishes. Files live under a directory keyed
//! by the partition-strategy pair and worker count, so sweep runs over
//! strategy combinations never clobber each other:
//!
//! ```text
//! <data_dir>/<shape_strategy>/<agent_strategy>/workers-<P>/
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use enclave_types::{CheckpointRecord, House, PartitionStrategy};

/// Errors that can occur while writing durable output.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Directory creation or file I/O failed.
    #[error("checkpoint I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Record serialization failed.
    #[error("checkpoint serialization error: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Writer for one run's checkpoint and history files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create the store directory for a strategy pair and worker count.
    pub fn create(
        data_dir: &Path,
        shape_strategy: PartitionStrategy,
        agent_strategy: PartitionStrategy,
        workers: u32,
    ) -> Result<Self, CheckpointError> {
        let dir = data_dir
            .join(shape_strategy.as_str())
            .join(agent_strategy.as_str())
            .join(format!("workers-{workers}"));
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Checkpoint store ready");
        Ok(Self { dir })
    }

    /// Path of the per-round checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join("checkpoint.json")
    }

    /// Path of the end-of-run history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    /// Overwrite the checkpoint file with this round's record.
    pub fn write_checkpoint(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        let file = File::create(self.checkpoint_path())?;
        serde_json::to_writer(BufWriter::new(file), record)?;
        debug!(
            iteration = record.iteration,
            houses = record.all_houses.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// Write the full run history once.
    pub fn write_history(&self, history: &[Vec<House>]) -> Result<(), CheckpointError> {
        let file = File::create(self.history_path())?;
        serde_json::to_writer(BufWriter::new(file), history)?;
        info!(
            rounds = history.len(),
            path = %self.history_path().display(),
            "History written"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use enclave_types::Race;

    use super::*;

    fn record(iteration: u32) -> CheckpointRecord {
        CheckpointRecord {
            iteration,
            unsatisfied_agents: vec![House::occupied(Race(1), 0.0, 0.0)],
            empty_houses: vec![House::empty(1.0, 1.0)],
            all_houses: vec![
                House::occupied(Race(1), 0.0, 0.0),
                House::empty(1.0, 1.0),
            ],
        }
    }

    #[test]
    fn store_path_is_keyed_by_strategies_and_workers() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::create(
            dir.path(),
            PartitionStrategy::Row,
            PartitionStrategy::Morton,
            4,
        )
        .unwrap();
        assert!(
            store
                .checkpoint_path()
                .ends_with("row/morton/workers-4/checkpoint.json")
        );
    }

    #[test]
    fn checkpoint_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::create(
            dir.path(),
            PartitionStrategy::Hilbert,
            PartitionStrategy::Hilbert,
            2,
        )
        .unwrap();

        store.write_checkpoint(&record(0)).unwrap();
        store.write_checkpoint(&record(1)).unwrap();

        let contents = std::fs::read_to_string(store.checkpoint_path()).unwrap();
        let back: CheckpointRecord = serde_json::from_str(&contents).unwrap();
        assert_eq!(back, record(1));
    }

    #[test]
    fn history_is_one_snapshot_per_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::create(
            dir.path(),
            PartitionStrategy::Col,
            PartitionStrategy::Col,
            1,
        )
        .unwrap();

        let history = vec![record(0).all_houses, record(1).all_houses];
        store.write_history(&history).unwrap();

        let contents = std::fs::read_to_string(store.history_path()).unwrap();
        let back: Vec<Vec<House>> = serde_json::from_str(&contents).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back, history);
    }
}
