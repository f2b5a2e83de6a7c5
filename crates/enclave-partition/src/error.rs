//! Error types for the partitioning crate.
//!
//! Partitioning failures are setup-time failures: the inputs are fixed for
//! the lifetime of a run, so a degenerate split would fail identically on
//! retry and is surfaced immediately instead.

use enclave_types::PartitionStrategy;

/// Errors produced while partitioning shapes or points.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// The requested partition count cannot produce a valid split.
    #[error("partition count must be at least 1, got {requested}")]
    InvalidPartitionCount {
        /// The rejected partition count.
        requested: u32,
    },

    /// An input ring is not a usable polygon.
    #[error("malformed geometry: {reason}")]
    MalformedGeometry {
        /// What made the ring unusable.
        reason: String,
    },

    /// A cut line failed to carve any area out of the remaining shape.
    #[error("{strategy} cut at {cut} produced an empty slice")]
    EmptyIntersection {
        /// The strategy that produced the degenerate cut.
        strategy: PartitionStrategy,
        /// The cut-line coordinate along the split axis.
        cut: f64,
    },

    /// A point record carries a coordinate that cannot be ordered.
    #[error("non-finite coordinate ({x}, {y}) cannot be partitioned")]
    NonFiniteCoordinate {
        /// The offending X value.
        x: f64,
        /// The offending Y value.
        y: f64,
    },
}
