//! Deadline-bound gather of worker reports.
//!
//! The coordinator cannot distinguish a slow worker from a dead one, and
//! proceeding without a worker's report would silently break the
//! house-count conservation invariant. Each worker's per-round reply is
//! therefore awaited under an optional deadline, and expiry is a terminal
//! outcome for the whole run (fail-stop), surfaced as a value rather than
//! a caught exception.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::error;

use enclave_types::{PartitionId, WorkerReport};

/// Failures observed while gathering a worker's round report.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The worker did not report within its deadline.
    #[error("worker {worker} exceeded the {deadline:?} deadline in round {round}")]
    Timeout {
        /// The late worker.
        worker: PartitionId,
        /// The round that timed out.
        round: u32,
        /// The configured deadline.
        deadline: Duration,
    },

    /// The worker stopped before producing a report.
    #[error("worker {worker} stopped before reporting round {round}")]
    Lost {
        /// The dead worker.
        worker: PartitionId,
        /// The round that lost its report.
        round: u32,
    },
}

/// Await one worker's round report, bounded by the configured deadline.
///
/// With no deadline configured the await is unbounded. Timeout and
/// worker loss are both logged with the worker's identity and round
/// number before being returned.
pub async fn await_report(
    worker: PartitionId,
    round: u32,
    reply: oneshot::Receiver<WorkerReport>,
    deadline: Option<Duration>,
) -> Result<WorkerReport, MonitorError> {
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, reply).await {
            Ok(received) => received.map_err(|_| MonitorError::Lost { worker, round }),
            Err(_) => Err(MonitorError::Timeout {
                worker,
                round,
                deadline: limit,
            }),
        },
        None => reply.await.map_err(|_| MonitorError::Lost { worker, round }),
    };

    if let Err(ref failure) = outcome {
        error!(worker = %worker, round, %failure, "Gather failed");
    }
    outcome
}
