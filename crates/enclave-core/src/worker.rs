//! Worker tasks.
//!
//! Each worker is a long-lived tokio task owning one [`LocalSimulation`]
//! for the whole run. The coordinator feeds it one [`RoundInput`] per
//! round over its command channel and receives the round's
//! [`WorkerReport`] on the input's reply channel. Workers never talk to
//! each other; all coordination is coordinator-mediated.
//!
//! A worker that hits a local error logs it with its identity and round
//! number and stops without replying -- the coordinator observes the
//! failure as a missing gather response and fail-stops the run.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use enclave_types::{House, PartitionId, WorkerReport};

use crate::sim::{LocalSimulation, SimulationError, SimulationParams};

/// One round's scatter payload for a single worker.
#[derive(Debug)]
pub struct RoundInput {
    /// The round being executed (zero-based).
    pub round: u32,
    /// Empty houses relocated to this worker, if any.
    pub empty_houses: Option<Vec<House>>,
    /// Newly satisfied agents relocated to this worker, if any.
    pub satisfied_agents: Option<Vec<House>>,
    /// Where the round's report goes.
    pub reply: oneshot::Sender<WorkerReport>,
}

/// Handle to a spawned worker task.
#[derive(Debug)]
pub struct WorkerHandle {
    id: PartitionId,
    commands: mpsc::Sender<RoundInput>,
    join: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// The worker's partition.
    #[must_use]
    pub const fn id(&self) -> PartitionId {
        self.id
    }

    /// Submit a round. Returns `false` when the worker has stopped.
    pub async fn submit(&self, input: RoundInput) -> bool {
        self.commands.send(input).await.is_ok()
    }

    /// Close the command channel and wait for the task to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.join.await;
    }
}

/// Spawn a worker for one partition.
///
/// Validates the model parameters (via [`LocalSimulation::new`]) before
/// the task starts, so a bad configuration fails at setup rather than
/// inside the first round.
pub fn spawn_worker(
    id: PartitionId,
    initial: Vec<House>,
    params: SimulationParams,
) -> Result<WorkerHandle, SimulationError> {
    let simulation = LocalSimulation::new(initial, params)?;
    // Rounds are lockstep; one in-flight command is all there ever is.
    let (commands, inbox) = mpsc::channel(1);
    let join = tokio::spawn(run_worker(id, simulation, inbox));
    Ok(WorkerHandle { id, commands, join })
}

/// The worker loop: one configure/update/harvest cycle per command.
async fn run_worker(
    id: PartitionId,
    mut simulation: LocalSimulation,
    mut inbox: mpsc::Receiver<RoundInput>,
) {
    info!(worker = %id, "Worker started");
    while let Some(input) = inbox.recv().await {
        let round = input.round;
        let started = Instant::now();

        simulation.configure(input.empty_houses, input.satisfied_agents);
        let unsatisfied = match simulation.update() {
            Ok(count) => count,
            Err(source) => {
                error!(worker = %id, round, %source, "Worker round failed");
                return;
            }
        };
        let harvest = simulation.harvest();

        debug!(
            worker = %id,
            round,
            houses = harvest.all_houses.len(),
            unsatisfied,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Worker round complete"
        );

        let report = WorkerReport {
            worker: id,
            round,
            empty_houses: harvest.empty_houses,
            unsatisfied_agents: harvest.unsatisfied_agents,
            all_houses: harvest.all_houses,
        };
        if input.reply.send(report).is_err() {
            // The coordinator gave up on this round; stop quietly.
            return;
        }
    }
    info!(worker = %id, "Worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use enclave_types::Race;

    use super::*;

    fn params() -> SimulationParams {
        SimulationParams {
            spacing: 1.0,
            similarity_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn worker_reports_a_round() {
        let initial = vec![
            House::occupied(Race(0), 0.0, 0.0),
            House::occupied(Race(1), 1.0, 0.0),
            House::empty(0.0, 1.0),
        ];
        let handle = spawn_worker(PartitionId::new(1), initial, params()).unwrap();

        let (reply, rx) = oneshot::channel();
        let submitted = handle
            .submit(RoundInput {
                round: 0,
                empty_houses: None,
                satisfied_agents: None,
                reply,
            })
            .await;
        assert!(submitted);

        let report = rx.await.unwrap();
        assert_eq!(report.worker, PartitionId::new(1));
        assert_eq!(report.round, 0);
        assert_eq!(report.all_houses.len(), 3);
        assert_eq!(report.empty_houses.len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn worker_carries_state_across_rounds() {
        let initial = vec![House::occupied(Race(0), 0.0, 0.0)];
        let handle = spawn_worker(PartitionId::new(2), initial, params()).unwrap();

        let (reply, rx) = oneshot::channel();
        assert!(
            handle
                .submit(RoundInput {
                    round: 0,
                    empty_houses: None,
                    satisfied_agents: None,
                    reply,
                })
                .await
        );
        let first = rx.await.unwrap();
        assert_eq!(first.all_houses.len(), 1);

        // Round 1 delivers two more cells; the satisfied occupant from
        // round 0 is still in the working set.
        let (reply, rx) = oneshot::channel();
        assert!(
            handle
                .submit(RoundInput {
                    round: 1,
                    empty_houses: Some(vec![House::empty(1.0, 1.0)]),
                    satisfied_agents: Some(vec![House::occupied(Race(1), 9.0, 9.0)]),
                    reply,
                })
                .await
        );
        let second = rx.await.unwrap();
        assert_eq!(second.all_houses.len(), 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_parameters_fail_at_spawn() {
        let result = spawn_worker(
            PartitionId::new(1),
            Vec::new(),
            SimulationParams {
                spacing: -1.0,
                similarity_threshold: 0.5,
            },
        );
        assert!(result.is_err());
    }
}
