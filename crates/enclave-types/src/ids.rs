//! Typed identifiers for partitions and simulation runs.
//!
//! Partitions are numbered `1..=P` during a scatter/gather cycle; partition
//! `0` is the coordinator and never holds simulation data. Wrapping the
//! number in [`PartitionId`] keeps partition indices from being confused
//! with round numbers or record counts at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The owning worker of a record during one scatter/gather cycle.
///
/// Valid data partitions are `1..=P` for a run with `P` workers. The
/// reserved value `0` names the coordinator, which only orchestrates and
/// never owns houses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// The reserved coordinator slot. Never carries simulation data.
    pub const COORDINATOR: Self = Self(0);

    /// Wrap a raw partition number.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw partition number.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The partition number as a slot index into a per-partition vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is the reserved coordinator slot.
    #[must_use]
    pub const fn is_coordinator(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Unique identifier for one simulation run.
///
/// Uses UUID v7 (time-ordered) so log lines and output directories from
/// successive runs sort chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
