//! Core record structs: houses, worker round payloads, checkpoints.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::ids::PartitionId;

// ---------------------------------------------------------------------------
// Race
// ---------------------------------------------------------------------------

/// A demographic category label carried by an occupied house.
///
/// Labels are small integers (the default model is binary, `0`/`1`); the
/// value itself is opaque to the engine, which only ever compares labels
/// for equality.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Race(pub u8);

impl Race {
    /// The raw category value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for Race {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// House
// ---------------------------------------------------------------------------

/// One spatial cell: a fixed position that is either occupied by an agent
/// of some [`Race`] or empty.
///
/// Positions never move; redistribution only reassigns the race labels
/// between positions. `race: None` and a defined label are the only two
/// states -- there is no numeric sentinel.
///
/// On the wire (checkpoint and history files) a house is the triple
/// `[race|null, x, y]`, which is what downstream plotting consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct House {
    /// The occupant's category, or `None` for an empty cell.
    pub race: Option<Race>,
    /// X coordinate in the source geometry's units.
    pub x: f64,
    /// Y coordinate in the source geometry's units.
    pub y: f64,
}

impl House {
    /// An occupied house.
    #[must_use]
    pub const fn occupied(race: Race, x: f64, y: f64) -> Self {
        Self {
            race: Some(race),
            x,
            y,
        }
    }

    /// An empty house.
    #[must_use]
    pub const fn empty(x: f64, y: f64) -> Self {
        Self { race: None, x, y }
    }

    /// Whether the cell currently has an occupant.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.race.is_some()
    }

    /// Whether the cell is currently empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.race.is_none()
    }
}

impl Serialize for House {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.race.map(Race::value), self.x, self.y).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for House {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (race, x, y) = <(Option<u8>, f64, f64)>::deserialize(deserializer)?;
        Ok(Self {
            race: race.map(Race),
            x,
            y,
        })
    }
}

// ---------------------------------------------------------------------------
// Worker round payloads
// ---------------------------------------------------------------------------

/// Everything a worker hands back to the coordinator at the round barrier.
///
/// `all_houses` is the worker's full set *before* the harvest prune, so the
/// coordinator's checkpoint sees every cell exactly once per round.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerReport {
    /// The reporting worker's partition.
    pub worker: PartitionId,
    /// The round this report belongs to (zero-based).
    pub round: u32,
    /// This worker's empty cells this round.
    pub empty_houses: Vec<House>,
    /// This worker's unsatisfied agents this round, ready to relocate.
    pub unsatisfied_agents: Vec<House>,
    /// Snapshot of the worker's full house set before pruning.
    pub all_houses: Vec<House>,
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// The per-round durable record, overwritten each round at a path keyed by
/// the partition-strategy pair and worker count.
///
/// Field order matches the JSON consumed by the analysis tooling.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointRecord {
    /// The round this record was written for (zero-based).
    pub iteration: u32,
    /// All workers' unsatisfied agents, concatenated.
    pub unsatisfied_agents: Vec<House>,
    /// All workers' empty houses, concatenated.
    pub empty_houses: Vec<House>,
    /// All workers' full house snapshots, concatenated.
    pub all_houses: Vec<House>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn house_serializes_as_triple() {
        let occupied = House::occupied(Race(1), 2.5, -3.0);
        assert_eq!(serde_json::to_string(&occupied).unwrap(), "[1,2.5,-3.0]");

        let empty = House::empty(0.0, 4.0);
        assert_eq!(serde_json::to_string(&empty).unwrap(), "[null,0.0,4.0]");
    }

    #[test]
    fn house_round_trips_through_json() {
        let houses = vec![House::occupied(Race(0), 1.0, 2.0), House::empty(3.0, 4.0)];
        let json = serde_json::to_string(&houses).unwrap();
        let back: Vec<House> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, houses);
    }

    #[test]
    fn occupancy_predicates_are_mutually_exclusive() {
        let occupied = House::occupied(Race(0), 0.0, 0.0);
        let empty = House::empty(0.0, 0.0);
        assert!(occupied.is_occupied() && !occupied.is_empty());
        assert!(empty.is_empty() && !empty.is_occupied());
    }

    #[test]
    fn checkpoint_record_uses_wire_field_names() {
        let record = CheckpointRecord {
            iteration: 3,
            unsatisfied_agents: vec![House::occupied(Race(1), 0.0, 0.0)],
            empty_houses: vec![House::empty(1.0, 1.0)],
            all_houses: vec![
                House::occupied(Race(1), 0.0, 0.0),
                House::empty(1.0, 1.0),
            ],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["iteration"], 3);
        assert_eq!(json["unsatisfied_agents"][0][0], 1);
        assert!(json["empty_houses"][0][0].is_null());
        assert_eq!(json["all_houses"].as_array().map(Vec::len), Some(2));
    }
}
