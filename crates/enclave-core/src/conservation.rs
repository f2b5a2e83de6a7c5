//! Conservation verification for the round barrier.
//!
//! Relocation reassigns race labels between fixed positions; it never
//! creates or destroys cells, and the number of occupants never changes.
//! Every well-formed round preserves both totals by construction, so this
//! check exists against data corruption and future bugs: a violation is
//! the run's most critical integrity signal and aborts it.

use enclave_types::WorkerReport;

/// The result of a conservation check for a single round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Every gathered count matches the seeded totals.
    Balanced,
    /// The gathered counts drifted from the seeded totals.
    Anomaly(ConservationAnomaly),
}

/// A conservation violation: what was expected and what was observed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "round {round} conservation anomaly: expected {expected_houses} houses \
     ({expected_occupied} occupied), observed {observed_houses} \
     ({observed_occupied} occupied)"
)]
pub struct ConservationAnomaly {
    /// The round whose gather violated conservation.
    pub round: u32,
    /// House count seeded into the run.
    pub expected_houses: usize,
    /// House count summed over this round's gathered snapshots.
    pub observed_houses: usize,
    /// Occupant count seeded into the run.
    pub expected_occupied: usize,
    /// Occupant count summed over this round's gathered snapshots.
    pub observed_occupied: usize,
}

/// Verify the conservation law over one round's gathered reports.
///
/// For every round: the union of the workers' `all_houses` snapshots must
/// contain exactly the seeded number of cells, and exactly the seeded
/// number of occupants. Each snapshot also decomposes as
/// `all = unsatisfied + empty + satisfied-occupied`, which is checked per
/// worker.
pub fn verify_round(
    round: u32,
    expected_houses: usize,
    expected_occupied: usize,
    reports: &[WorkerReport],
) -> ConservationResult {
    let mut observed_houses: usize = 0;
    let mut observed_occupied: usize = 0;

    for report in reports {
        observed_houses = observed_houses.saturating_add(report.all_houses.len());
        let occupied = report.all_houses.iter().filter(|h| h.is_occupied()).count();
        observed_occupied = observed_occupied.saturating_add(occupied);

        // Per-worker decomposition: unsatisfied agents are a subset of
        // the occupied houses, empties the complement of the occupied.
        let empty = report.all_houses.len().saturating_sub(occupied);
        if report.empty_houses.len() != empty
            || report.unsatisfied_agents.len() > occupied
        {
            return ConservationResult::Anomaly(ConservationAnomaly {
                round,
                expected_houses,
                observed_houses: report.all_houses.len(),
                expected_occupied,
                observed_occupied: occupied,
            });
        }
    }

    if observed_houses == expected_houses && observed_occupied == expected_occupied {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(ConservationAnomaly {
            round,
            expected_houses,
            observed_houses,
            expected_occupied,
            observed_occupied,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use enclave_types::{House, PartitionId, Race};

    use super::*;

    fn report(worker: u32, houses: Vec<House>, unsatisfied: Vec<House>) -> WorkerReport {
        let empty_houses = houses.iter().filter(|h| h.is_empty()).copied().collect();
        WorkerReport {
            worker: PartitionId::new(worker),
            round: 0,
            empty_houses,
            unsatisfied_agents: unsatisfied,
            all_houses: houses,
        }
    }

    #[test]
    fn balanced_round_passes() {
        let reports = vec![
            report(
                1,
                vec![House::occupied(Race(0), 0.0, 0.0), House::empty(1.0, 1.0)],
                vec![House::occupied(Race(0), 0.0, 0.0)],
            ),
            report(2, vec![House::occupied(Race(1), 2.0, 2.0)], Vec::new()),
        ];
        assert_eq!(verify_round(0, 3, 2, &reports), ConservationResult::Balanced);
    }

    #[test]
    fn missing_houses_are_an_anomaly() {
        let reports = vec![report(1, vec![House::empty(0.0, 0.0)], Vec::new())];
        let result = verify_round(2, 5, 1, &reports);
        let ConservationResult::Anomaly(anomaly) = result else {
            panic!("expected anomaly");
        };
        assert_eq!(anomaly.round, 2);
        assert_eq!(anomaly.expected_houses, 5);
        assert_eq!(anomaly.observed_houses, 1);
    }

    #[test]
    fn occupied_drift_is_an_anomaly() {
        let reports = vec![report(
            1,
            vec![House::occupied(Race(0), 0.0, 0.0), House::occupied(Race(1), 1.0, 0.0)],
            Vec::new(),
        )];
        assert!(matches!(
            verify_round(0, 2, 1, &reports),
            ConservationResult::Anomaly(_)
        ));
    }

    #[test]
    fn inconsistent_report_decomposition_is_an_anomaly() {
        let mut bad = report(1, vec![House::occupied(Race(0), 0.0, 0.0)], Vec::new());
        bad.empty_houses.push(House::empty(9.0, 9.0));
        assert!(matches!(
            verify_round(0, 1, 1, &[bad]),
            ConservationResult::Anomaly(_)
        ));
    }
}
