//! The round loop: scatter, gather, conserve, checkpoint, relocate.
//!
//! [`run_simulation`] drives a fixed set of worker tasks through
//! `run.iterations` synchronous rounds. Rounds are strict barriers: the
//! coordinator holds the next scatter until every worker's report for the
//! current round is in and relocation has produced the new slots, so a
//! house relocated in round `i` is visible to neighbor computation in
//! round `i + 1` and never earlier. There is no pipelining -- relocation
//! needs the global unsatisfied/empty pools, which only exist once all
//! workers have reported.
//!
//! Cross-round coordinator state lives in one owned [`RoundState`] value
//! that each round consumes and returns; nothing is shared or aliased
//! between rounds.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use enclave_partition::PartitionError;
use enclave_types::{CheckpointRecord, House, PartitionId, RunId, WorkerReport};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::config::{ConfigError, SimulationConfig};
use crate::conservation::{self, ConservationAnomaly, ConservationResult};
use crate::monitor::{self, MonitorError};
use crate::redistribute;
use crate::sim::{SimulationError, SimulationParams};
use crate::worker::{self, RoundInput, WorkerHandle};

/// Errors that can end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The configuration is unusable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Worker setup failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: SimulationError,
    },

    /// A worker timed out or died; the run fail-stops.
    #[error("gather error: {source}")]
    Gather {
        /// The underlying monitor error.
        #[from]
        source: MonitorError,
    },

    /// Relocation could not re-partition its outputs.
    #[error("partition error: {source}")]
    Partition {
        /// The underlying partition error.
        #[from]
        source: PartitionError,
    },

    /// Durable output could not be written.
    #[error("checkpoint error: {source}")]
    Checkpoint {
        /// The underlying checkpoint error.
        #[from]
        source: CheckpointError,
    },

    /// A round's gathered counts violated conservation.
    #[error("conservation error: {source}")]
    Conservation {
        /// The detected anomaly.
        #[from]
        source: ConservationAnomaly,
    },

    /// The initial scatter slots do not match the worker count.
    #[error("expected {expected} scatter slots (workers + coordinator), got {actual}")]
    SlotLayout {
        /// Slots required by the configured worker count.
        expected: usize,
        /// Slots actually provided.
        actual: usize,
    },
}

/// What one completed round looked like.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    /// The round number (zero-based).
    pub round: u32,
    /// Total houses gathered this round.
    pub total_houses: usize,
    /// Unsatisfied agents gathered this round.
    pub unsatisfied_agents: usize,
    /// Empty houses gathered this round.
    pub empty_houses: usize,
    /// Wall time for the whole barrier cycle.
    pub elapsed: Duration,
}

/// Callback invoked after each round completes.
///
/// Implementations can use this to surface progress without touching the
/// loop itself.
pub trait RoundCallback: Send {
    /// Called after a round completes successfully.
    fn on_round(&mut self, summary: &RoundSummary);
}

/// A no-op round callback for testing and headless runs.
pub struct NoOpCallback;

impl RoundCallback for NoOpCallback {
    fn on_round(&mut self, _summary: &RoundSummary) {}
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunResult {
    /// The run's identifier, as it appeared in the logs.
    pub run_id: RunId,
    /// Rounds driven to completion.
    pub rounds_completed: u32,
    /// The invariant house count carried through the run.
    pub total_houses: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// The last round's summary, if any round completed.
    pub final_summary: Option<RoundSummary>,
}

/// The coordinator's cross-round state, owned and versioned.
struct RoundState {
    /// The next round to execute (zero-based).
    round: u32,
    /// Relocated empty houses awaiting the next scatter, by partition.
    pending_empty: Vec<Option<Vec<House>>>,
    /// Relocated satisfied agents awaiting the next scatter, by partition.
    pending_satisfied: Vec<Option<Vec<House>>>,
    /// One `all_houses` snapshot per completed round.
    history: Vec<Vec<House>>,
    /// The run's relocation randomness.
    rng: SmallRng,
}

/// Drive a full simulation run.
///
/// `initial` is the seed population already split into scatter slots:
/// `workers + 1` entries indexed by partition number, slot 0 (the
/// coordinator) empty. Each worker is spawned with its slot's houses and
/// then driven through `run.iterations` rounds; every round writes a
/// checkpoint and the history file is written once at the end.
///
/// # Errors
///
/// Any worker timeout, lost worker, conservation anomaly, or storage
/// failure terminates the run with the corresponding [`RunError`]. All
/// checkpoints written up to the last completed round remain on disk.
pub async fn run_simulation(
    initial: Vec<Option<Vec<House>>>,
    config: &SimulationConfig,
    callback: &mut dyn RoundCallback,
) -> Result<RunResult, RunError> {
    config.validate()?;

    let run_id = RunId::new();
    let started_at = Utc::now();
    let partitions = config.run.workers;
    let expected_slots = (partitions as usize).saturating_add(1);
    if initial.len() != expected_slots {
        return Err(RunError::SlotLayout {
            expected: expected_slots,
            actual: initial.len(),
        });
    }

    let expected_houses: usize = initial.iter().flatten().map(Vec::len).sum();
    let expected_occupied: usize = initial
        .iter()
        .flatten()
        .flat_map(|houses| houses.iter())
        .filter(|h| h.is_occupied())
        .count();

    let store = CheckpointStore::create(
        &config.storage.data_dir,
        config.partitioning.shape_strategy,
        config.partitioning.agent_strategy,
        partitions,
    )?;

    info!(
        run_id = %run_id,
        world = config.world.name,
        seed = config.world.seed,
        workers = partitions,
        iterations = config.run.iterations,
        houses = expected_houses,
        occupied = expected_occupied,
        shape_strategy = %config.partitioning.shape_strategy,
        agent_strategy = %config.partitioning.agent_strategy,
        "Run starting"
    );

    let params = SimulationParams {
        spacing: config.model.spacing,
        similarity_threshold: config.model.similarity_threshold,
    };

    let mut slots = initial;
    let mut workers: Vec<WorkerHandle> = Vec::with_capacity(partitions as usize);
    for number in 1..=partitions {
        let assigned = slots
            .get_mut(number as usize)
            .and_then(Option::take)
            .unwrap_or_default();
        if assigned.is_empty() {
            warn!(worker = number, "Worker starts with no houses");
        }
        workers.push(worker::spawn_worker(
            PartitionId::new(number),
            assigned,
            params,
        )?);
    }

    let mut state = RoundState {
        round: 0,
        pending_empty: vec![None; expected_slots],
        pending_satisfied: vec![None; expected_slots],
        history: Vec::new(),
        rng: SmallRng::seed_from_u64(config.world.seed),
    };

    let mut final_summary: Option<RoundSummary> = None;
    for _ in 0..config.run.iterations {
        let (next_state, summary) = execute_round(
            state,
            &workers,
            config,
            &store,
            expected_houses,
            expected_occupied,
        )
        .await?;
        state = next_state;
        callback.on_round(&summary);
        final_summary = Some(summary);
    }

    store.write_history(&state.history)?;

    for handle in workers {
        handle.shutdown().await;
    }

    let finished_at = Utc::now();
    Ok(RunResult {
        run_id,
        rounds_completed: state.round,
        total_houses: expected_houses,
        started_at,
        finished_at,
        final_summary,
    })
}

/// Execute one barrier round, consuming and returning the round state.
async fn execute_round(
    mut state: RoundState,
    workers: &[WorkerHandle],
    config: &SimulationConfig,
    store: &CheckpointStore,
    expected_houses: usize,
    expected_occupied: usize,
) -> Result<(RoundState, RoundSummary), RunError> {
    let round = state.round;
    let started = Instant::now();

    // Scatter: hand each worker its relocated houses and a reply slot.
    let mut replies: Vec<(PartitionId, oneshot::Receiver<WorkerReport>)> =
        Vec::with_capacity(workers.len());
    for handle in workers {
        let (reply, receiver) = oneshot::channel();
        let input = RoundInput {
            round,
            empty_houses: take_slot(&mut state.pending_empty, handle.id()),
            satisfied_agents: take_slot(&mut state.pending_satisfied, handle.id()),
            reply,
        };
        if !handle.submit(input).await {
            return Err(MonitorError::Lost {
                worker: handle.id(),
                round,
            }
            .into());
        }
        replies.push((handle.id(), receiver));
    }

    // Gather: every worker, each bounded by the configured deadline.
    let deadline = config.run.worker_deadline();
    let mut reports: Vec<WorkerReport> = Vec::with_capacity(replies.len());
    for (worker_id, receiver) in replies {
        reports.push(monitor::await_report(worker_id, round, receiver, deadline).await?);
    }

    // Conservation check before anything durable happens.
    if let ConservationResult::Anomaly(anomaly) =
        conservation::verify_round(round, expected_houses, expected_occupied, &reports)
    {
        error!(round, %anomaly, "Conservation check failed");
        return Err(anomaly.into());
    }

    // Fold the reports into the checkpoint record and relocation inputs.
    let slot_count = state.pending_empty.len();
    let mut unsatisfied_concat: Vec<House> = Vec::new();
    let mut empty_concat: Vec<House> = Vec::new();
    let mut all_concat: Vec<House> = Vec::new();
    let mut unsatisfied_slots: Vec<Option<Vec<House>>> = vec![None; slot_count];
    let mut empty_slots: Vec<Option<Vec<House>>> = vec![None; slot_count];

    for report in reports {
        unsatisfied_concat.extend_from_slice(&report.unsatisfied_agents);
        empty_concat.extend_from_slice(&report.empty_houses);
        all_concat.extend_from_slice(&report.all_houses);

        let index = report.worker.index();
        if !report.unsatisfied_agents.is_empty() {
            if let Some(slot) = unsatisfied_slots.get_mut(index) {
                *slot = Some(report.unsatisfied_agents);
            }
        }
        if !report.empty_houses.is_empty() {
            if let Some(slot) = empty_slots.get_mut(index) {
                *slot = Some(report.empty_houses);
            }
        }
    }

    let unsatisfied_count = unsatisfied_concat.len();
    let empty_count = empty_concat.len();
    let total_houses = all_concat.len();

    let record = CheckpointRecord {
        iteration: round,
        unsatisfied_agents: unsatisfied_concat,
        empty_houses: empty_concat,
        all_houses: all_concat,
    };
    store.write_checkpoint(&record)?;

    // Relocate and stage the next round's scatter.
    let relocation = redistribute::relocate(
        &unsatisfied_slots,
        &empty_slots,
        config.run.workers,
        config.partitioning.agent_strategy,
        &mut state.rng,
    )?;
    state.pending_satisfied = relocation.satisfied_agents;
    state.pending_empty = relocation.empty_houses;
    state.history.push(record.all_houses);
    state.round = round.saturating_add(1);

    let elapsed = started.elapsed();
    info!(
        round,
        total_houses,
        unsatisfied = unsatisfied_count,
        empty = empty_count,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Round complete"
    );

    Ok((
        state,
        RoundSummary {
            round,
            total_houses,
            unsatisfied_agents: unsatisfied_count,
            empty_houses: empty_count,
            elapsed,
        },
    ))
}

/// Take a worker's pending slot, leaving the sentinel behind.
fn take_slot(slots: &mut [Option<Vec<House>>], worker: PartitionId) -> Option<Vec<House>> {
    slots.get_mut(worker.index()).and_then(Option::take)
}

/// Log the end-of-run summary.
pub fn log_run_end(result: &RunResult) {
    info!(
        run_id = %result.run_id,
        rounds = result.rounds_completed,
        houses = result.total_houses,
        final_unsatisfied = result.final_summary.as_ref().map(|s| s.unsatisfied_agents),
        "Run ended"
    );
    if result.final_summary.is_none() {
        warn!("Run ended with no rounds executed");
    }
}
