//! Per-worker local simulation state.
//!
//! Each worker owns one [`LocalSimulation`] for the lifetime of a run and
//! drives it through the same cycle every round:
//!
//! 1. [`configure`] -- absorb the houses the relocation sent this worker
//!    (first call seeds the set from the initial assignment instead).
//! 2. [`update`] -- rebuild the neighbor graph and evaluate every
//!    occupied house's satisfaction.
//! 3. [`harvest`] -- hand back the empty houses, unsatisfied agents, and
//!    the pre-prune snapshot, then drop those records from the working
//!    set until the next `configure` returns them, possibly elsewhere.
//!
//! [`configure`]: LocalSimulation::configure
//! [`update`]: LocalSimulation::update
//! [`harvest`]: LocalSimulation::harvest

use std::collections::BTreeSet;

use tracing::debug;

use enclave_types::House;

use crate::neighbors::{IndexError, NeighborGrid};

/// Errors that can occur while running the local step.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The grid spacing cannot drive neighbor discovery.
    #[error("spacing must be positive and finite, got {spacing}")]
    InvalidSpacing {
        /// The rejected spacing value.
        spacing: f64,
    },

    /// The similarity threshold is outside `[0, 1]`.
    #[error("similarity threshold must be within [0, 1], got {value}")]
    InvalidThreshold {
        /// The rejected threshold value.
        value: f64,
    },

    /// The proximity index rejected its configuration.
    #[error("neighbor index error: {source}")]
    Index {
        /// The underlying index error.
        #[from]
        source: IndexError,
    },
}

/// Model parameters shared by every worker in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Grid cell size used during population generation. Neighbor
    /// discovery uses radius `2 * spacing`.
    pub spacing: f64,
    /// Minimum same-race neighbor fraction an agent tolerates.
    pub similarity_threshold: f64,
}

/// What a worker hands back at the round barrier.
#[derive(Debug, Clone)]
pub struct RoundHarvest {
    /// Every currently empty house.
    pub empty_houses: Vec<House>,
    /// Every unsatisfied agent, as `(race, x, y)` ready to relocate.
    pub unsatisfied_agents: Vec<House>,
    /// The full house set before the prune.
    pub all_houses: Vec<House>,
}

/// One worker's mutable simulation state.
#[derive(Debug)]
pub struct LocalSimulation {
    params: SimulationParams,
    /// Initial assignment, consumed by the first `configure` call.
    seed: Option<Vec<House>>,
    houses: Vec<House>,
    unsatisfied: Vec<House>,
    unsatisfied_slots: BTreeSet<usize>,
}

impl LocalSimulation {
    /// Create the state for one worker from its initial house assignment.
    pub fn new(initial: Vec<House>, params: SimulationParams) -> Result<Self, SimulationError> {
        if !(params.spacing.is_finite() && params.spacing > 0.0) {
            return Err(SimulationError::InvalidSpacing {
                spacing: params.spacing,
            });
        }
        let threshold = params.similarity_threshold;
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(SimulationError::InvalidThreshold { value: threshold });
        }
        Ok(Self {
            params,
            seed: Some(initial),
            houses: Vec::new(),
            unsatisfied: Vec::new(),
            unsatisfied_slots: BTreeSet::new(),
        })
    }

    /// Absorb the round's incoming houses.
    ///
    /// The first call initializes the working set from the initial
    /// assignment; every call appends whichever of the two incoming
    /// groups the relocation produced for this worker.
    pub fn configure(
        &mut self,
        empty_houses: Option<Vec<House>>,
        satisfied_agents: Option<Vec<House>>,
    ) {
        if let Some(initial) = self.seed.take() {
            self.houses = initial;
        }
        if let Some(incoming) = empty_houses {
            self.houses.extend(incoming);
        }
        if let Some(incoming) = satisfied_agents {
            self.houses.extend(incoming);
        }
    }

    /// Rebuild the neighbor graph and evaluate satisfaction.
    ///
    /// Returns the number of unsatisfied agents found. The evaluation is
    /// a pure function of the current house set: identical input state
    /// yields an identical unsatisfied set.
    pub fn update(&mut self) -> Result<usize, SimulationError> {
        let positions: Vec<(f64, f64)> = self.houses.iter().map(|h| (h.x, h.y)).collect();
        let radius = self.params.spacing * 2.0;
        let grid = NeighborGrid::build(&positions, radius)?;
        let adjacency = grid.adjacency();

        self.unsatisfied.clear();
        self.unsatisfied_slots.clear();

        for (index, house) in self.houses.iter().enumerate() {
            let Some(race) = house.race else {
                continue;
            };
            let neighbors = adjacency.get(index).map_or(&[] as &[usize], Vec::as_slice);
            if is_unsatisfied(race, neighbors, &self.houses, self.params.similarity_threshold) {
                self.unsatisfied.push(*house);
                self.unsatisfied_slots.insert(index);
            }
        }

        debug!(
            houses = self.houses.len(),
            unsatisfied = self.unsatisfied.len(),
            "Local update complete"
        );
        Ok(self.unsatisfied.len())
    }

    /// Return the round's outputs and prune the working set.
    ///
    /// The snapshot is taken before removal so the coordinator's
    /// checkpoint sees every cell. Afterwards the unsatisfied agents'
    /// slots and every empty house are dropped; relocation re-issues
    /// them (possibly to another worker) before the next `update`.
    pub fn harvest(&mut self) -> RoundHarvest {
        let all_houses = self.houses.clone();
        let empty_houses: Vec<House> = self.houses.iter().filter(|h| h.is_empty()).copied().collect();

        let kept: Vec<House> = self
            .houses
            .iter()
            .enumerate()
            .filter(|(index, house)| house.is_occupied() && !self.unsatisfied_slots.contains(index))
            .map(|(_, house)| *house)
            .collect();
        self.houses = kept;

        let unsatisfied_agents = std::mem::take(&mut self.unsatisfied);
        self.unsatisfied_slots.clear();

        debug!(
            empty = empty_houses.len(),
            unsatisfied = unsatisfied_agents.len(),
            kept = self.houses.len(),
            "Harvest complete"
        );
        RoundHarvest {
            empty_houses,
            unsatisfied_agents,
            all_houses,
        }
    }

    /// Number of houses currently in the working set.
    #[must_use]
    pub const fn house_count(&self) -> usize {
        self.houses.len()
    }
}

/// The satisfaction rule for one occupied house.
///
/// Empty neighbors count toward the denominator; a house with no
/// neighbors at all is vacuously satisfied.
#[allow(clippy::cast_precision_loss)]
fn is_unsatisfied(
    race: enclave_types::Race,
    neighbors: &[usize],
    houses: &[House],
    similarity_threshold: f64,
) -> bool {
    if neighbors.is_empty() {
        return false;
    }
    let same = neighbors
        .iter()
        .filter(|n| {
            houses
                .get(**n)
                .is_some_and(|h| h.race == Some(race))
        })
        .count();
    let fraction = same as f64 / neighbors.len() as f64;
    fraction < similarity_threshold
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use enclave_types::Race;

    use super::*;

    fn params(spacing: f64, threshold: f64) -> SimulationParams {
        SimulationParams {
            spacing,
            similarity_threshold: threshold,
        }
    }

    /// Four houses on a unit cell, all mutually within radius 2.0:
    /// two of race 0, one of race 1, one empty.
    fn corner_houses() -> Vec<House> {
        vec![
            House::occupied(Race(0), 0.0, 0.0),
            House::occupied(Race(0), 1.0, 0.0),
            House::occupied(Race(1), 0.0, 1.0),
            House::empty(1.0, 1.0),
        ]
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(LocalSimulation::new(Vec::new(), params(0.0, 0.5)).is_err());
        assert!(LocalSimulation::new(Vec::new(), params(1.0, 1.5)).is_err());
        assert!(LocalSimulation::new(Vec::new(), params(1.0, -0.1)).is_err());
    }

    #[test]
    fn mixed_corner_scenario_flags_all_occupied_houses() {
        // Race-1 at (0,1) sees 0/3 same; each race-0 house sees 1/3,
        // which is below the 0.5 threshold.
        let mut sim = LocalSimulation::new(corner_houses(), params(1.0, 0.5)).unwrap();
        sim.configure(None, None);
        let unsatisfied = sim.update().unwrap();
        assert_eq!(unsatisfied, 3);

        let harvest = sim.harvest();
        assert_eq!(harvest.unsatisfied_agents.len(), 3);
        assert_eq!(harvest.empty_houses, vec![House::empty(1.0, 1.0)]);
        assert_eq!(harvest.all_houses.len(), 4);
        // Everything was either unsatisfied or empty; nothing is kept.
        assert_eq!(sim.house_count(), 0);
    }

    #[test]
    fn uniform_neighborhood_is_always_satisfied() {
        let houses = vec![
            House::occupied(Race(1), 0.0, 0.0),
            House::occupied(Race(1), 1.0, 0.0),
            House::occupied(Race(1), 0.0, 1.0),
        ];
        let mut sim = LocalSimulation::new(houses, params(1.0, 0.99)).unwrap();
        sim.configure(None, None);
        assert_eq!(sim.update().unwrap(), 0);
    }

    #[test]
    fn isolated_agent_is_vacuously_satisfied() {
        let houses = vec![
            House::occupied(Race(0), 0.0, 0.0),
            House::occupied(Race(1), 50.0, 50.0),
        ];
        let mut sim = LocalSimulation::new(houses, params(1.0, 1.0)).unwrap();
        sim.configure(None, None);
        assert_eq!(sim.update().unwrap(), 0);
    }

    #[test]
    fn empty_houses_dilute_the_neighborhood() {
        // Race-0 agent with one same-race neighbor and two empty cells:
        // fraction 1/3 fails a 0.4 threshold even with no other race
        // present.
        let houses = vec![
            House::occupied(Race(0), 0.0, 0.0),
            House::occupied(Race(0), 1.0, 0.0),
            House::empty(0.0, 1.0),
            House::empty(1.0, 1.0),
        ];
        let mut sim = LocalSimulation::new(houses, params(1.0, 0.4)).unwrap();
        sim.configure(None, None);
        assert_eq!(sim.update().unwrap(), 2);
    }

    #[test]
    fn update_is_deterministic_for_identical_state() {
        let mut a = LocalSimulation::new(corner_houses(), params(1.0, 0.5)).unwrap();
        let mut b = LocalSimulation::new(corner_houses(), params(1.0, 0.5)).unwrap();
        a.configure(None, None);
        b.configure(None, None);
        a.update().unwrap();
        b.update().unwrap();
        let ha = a.harvest();
        let hb = b.harvest();
        assert_eq!(ha.unsatisfied_agents, hb.unsatisfied_agents);
        assert_eq!(ha.empty_houses, hb.empty_houses);
    }

    #[test]
    fn configure_appends_relocated_houses() {
        let mut sim = LocalSimulation::new(corner_houses(), params(1.0, 0.5)).unwrap();
        sim.configure(None, None);
        assert_eq!(sim.house_count(), 4);
        sim.configure(
            Some(vec![House::empty(2.0, 2.0)]),
            Some(vec![House::occupied(Race(1), 3.0, 3.0)]),
        );
        assert_eq!(sim.house_count(), 6);
    }

    #[test]
    fn harvest_conserves_the_working_set() {
        let mut sim = LocalSimulation::new(corner_houses(), params(1.0, 0.5)).unwrap();
        sim.configure(None, None);
        sim.update().unwrap();
        let before = sim.house_count();
        let harvest = sim.harvest();
        let satisfied_kept = sim.house_count();
        assert_eq!(
            before,
            harvest.unsatisfied_agents.len() + harvest.empty_houses.len() + satisfied_kept
        );
    }
}
