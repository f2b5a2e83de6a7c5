//! Enumeration types shared across the Enclave workspace.

use serde::{Deserialize, Serialize};

/// A spatial partitioning strategy.
///
/// `Row` and `Col` cut the bounding box into equal-width bands along one
/// axis. The three curve strategies order records along a space-filling
/// curve and split the ordering into contiguous, near-equal chunks, which
/// trades exact balance guarantees for spatial locality (fewer neighbor
/// relationships crossing partition boundaries than a naive coordinate
/// sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStrategy {
    /// Equal bands along the Y axis; partition 1 is the topmost band.
    Row,
    /// Equal bands along the X axis; partition 1 is the rightmost band.
    Col,
    /// Hilbert-curve ordering.
    Hilbert,
    /// Morton (Z-order) ordering.
    Morton,
    /// Geohash cell ordering (longitude-first bit interleaving).
    Geohash,
}

impl PartitionStrategy {
    /// Every strategy, in the order used by sweep tooling.
    pub const ALL: [Self; 5] = [
        Self::Row,
        Self::Col,
        Self::Hilbert,
        Self::Morton,
        Self::Geohash,
    ];

    /// The lowercase name used in config files and output paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Col => "col",
            Self::Hilbert => "hilbert",
            Self::Morton => "morton",
            Self::Geohash => "geohash",
        }
    }
}

impl core::fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_serde_uses_lowercase_names() {
        for strategy in PartitionStrategy::ALL {
            let json = serde_json::to_string(&strategy).ok();
            assert_eq!(json, Some(format!("\"{strategy}\"")));
        }
    }

    #[test]
    fn strategy_parses_from_lowercase() {
        let parsed: Result<PartitionStrategy, _> = serde_json::from_str("\"morton\"");
        assert_eq!(parsed.ok(), Some(PartitionStrategy::Morton));
    }
}
