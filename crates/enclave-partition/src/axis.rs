//! Row/column band partitioning.
//!
//! Geometry mode carves the input area with equally spaced cut lines,
//! assigning the outer slice at each cut and carrying the remainder to the
//! next one; the final remainder becomes the last partition. Cuts run from
//! the far edge inward, so partition 1 is the extreme row (top) or column
//! (right). Point mode assigns each record to the equally spaced interval
//! containing its coordinate, numbered upward from the low edge.

use tracing::debug;

use enclave_types::{PartitionId, PartitionStrategy};

use crate::error::PartitionError;
use crate::geometry::{Axis, Bounds, Polygon, clip_half_plane};
use crate::ShapePartition;

/// `count` equally spaced values from `min` to `max` inclusive.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn linspace(min: f64, max: f64, count: usize) -> Vec<f64> {
    if count < 2 {
        return vec![min];
    }
    let span = max - min;
    let steps = (count - 1) as f64;
    (0..count)
        .map(|i| {
            let t = i as f64 / steps;
            t.mul_add(span, min)
        })
        .collect()
}

/// The band a coordinate falls in, as a zero-based index in `[0, bands)`.
///
/// Equivalent to membership in the half-open intervals between equally
/// spaced boundaries, with the top interval closed so the record at the
/// global maximum is never dropped.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn band_index(value: f64, min: f64, max: f64, bands: u32) -> u32 {
    if bands <= 1 || max <= min {
        return 0;
    }
    let scaled = ((value - min) / (max - min)) * f64::from(bands);
    let raw = scaled.floor();
    let index = if raw.is_sign_negative() { 0 } else { raw as u32 };
    index.min(bands.saturating_sub(1))
}

/// Split shapes into `partitions` bands along the given axis.
pub(crate) fn shape_bands(
    shapes: &[Polygon],
    partitions: u32,
    axis: Axis,
    strategy: PartitionStrategy,
) -> Result<Vec<ShapePartition>, PartitionError> {
    let mut bounds_iter = shapes.iter().map(Polygon::bounds);
    let Some(mut bounds) = bounds_iter.next() else {
        return Err(PartitionError::MalformedGeometry {
            reason: String::from("no input shapes to partition"),
        });
    };
    for b in bounds_iter {
        bounds.merge(&b);
    }

    if partitions == 1 {
        return Ok(vec![ShapePartition {
            partition: PartitionId::new(1),
            pieces: shapes.to_vec(),
        }]);
    }

    let cuts = interior_cuts(&bounds, axis, partitions);
    let mut remaining: Vec<Polygon> = shapes.to_vec();
    let mut result: Vec<ShapePartition> = Vec::with_capacity(partitions as usize);

    for (number, cut) in (1..partitions).zip(cuts) {
        let outer: Vec<Polygon> = remaining
            .iter()
            .filter_map(|p| clip_half_plane(p, axis, cut, true))
            .collect();
        if outer.is_empty() {
            return Err(PartitionError::EmptyIntersection { strategy, cut });
        }
        let inner: Vec<Polygon> = remaining
            .iter()
            .filter_map(|p| clip_half_plane(p, axis, cut, false))
            .collect();
        if inner.is_empty() {
            return Err(PartitionError::EmptyIntersection { strategy, cut });
        }

        debug!(
            partition = number,
            cut,
            pieces = outer.len(),
            "Assigned outer band"
        );
        result.push(ShapePartition {
            partition: PartitionId::new(number),
            pieces: outer,
        });
        remaining = inner;
    }

    result.push(ShapePartition {
        partition: PartitionId::new(partitions),
        pieces: remaining,
    });
    Ok(result)
}

/// Interior cut lines ordered from the far edge inward.
fn interior_cuts(bounds: &Bounds, axis: Axis, partitions: u32) -> Vec<f64> {
    let boundaries = linspace(
        bounds.min_along(axis),
        bounds.max_along(axis),
        (partitions as usize).saturating_add(1),
    );
    let interior: Vec<f64> = boundaries
        .into_iter()
        .skip(1)
        .take((partitions as usize).saturating_sub(1))
        .collect();
    interior.into_iter().rev().collect()
}
