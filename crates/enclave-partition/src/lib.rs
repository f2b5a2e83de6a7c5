//! Spatial partitioning for the Enclave segregation simulator.
//!
//! Splits geographic data into `P` balanced, spatially coherent chunks,
//! one per worker. Two record kinds pass through here:
//!
//! - **Shapes** ([`partition_shapes`]): the study area's polygons, split
//!   once at startup to give each worker a territory.
//! - **Points** ([`partition_points`]): house/agent records, re-tagged on
//!   every redistribution.
//!
//! Five strategies are supported ([`PartitionStrategy`]): `row`/`col`
//! band splits and three space-filling curve orderings (`hilbert`,
//! `morton`, `geohash`). Curve orderings give up exact balance guarantees
//! for spatial locality, which cuts the number of neighbor relationships
//! that cross partition boundaries.
//!
//! Partition `0` is the coordinator and never receives data. A partition
//! that ends up with zero records is represented downstream as an
//! explicit `None` slot (see [`chunk_by_partition`]), never as an empty
//! collection.

pub mod error;
pub mod geometry;

mod axis;
mod curve;

use tracing::debug;

use enclave_types::{House, PartitionId, PartitionStrategy};

pub use error::PartitionError;
use geometry::{Axis, Bounds, Coord, Polygon};

/// One worker's share of the study area after the geography split.
#[derive(Debug, Clone)]
pub struct ShapePartition {
    /// The owning worker.
    pub partition: PartitionId,
    /// The polygon pieces making up this worker's territory.
    pub pieces: Vec<Polygon>,
}

/// Split the study-area polygons into `partitions` territories.
///
/// Row/col strategies carve the area with equally spaced cut lines from
/// the far edge inward; the curve strategies order whole polygons by the
/// curve key of their bounding-box center and chunk the ordering. With
/// more partitions than polygons a curve split can leave some partitions
/// without territory; those are simply absent from the result.
pub fn partition_shapes(
    shapes: &[Polygon],
    partitions: u32,
    strategy: PartitionStrategy,
) -> Result<Vec<ShapePartition>, PartitionError> {
    if partitions == 0 {
        return Err(PartitionError::InvalidPartitionCount {
            requested: partitions,
        });
    }

    let result = match strategy {
        PartitionStrategy::Row => axis::shape_bands(shapes, partitions, Axis::Y, strategy),
        PartitionStrategy::Col => axis::shape_bands(shapes, partitions, Axis::X, strategy),
        PartitionStrategy::Hilbert | PartitionStrategy::Morton | PartitionStrategy::Geohash => {
            curve_shape_chunks(shapes, partitions, strategy)
        }
    }?;

    debug!(
        %strategy,
        partitions,
        shapes = shapes.len(),
        territories = result.len(),
        "Study area partitioned"
    );
    Ok(result)
}

/// Tag every house with the partition that owns it.
///
/// The returned vector parallels `houses`. Row/col strategies assign by
/// interval membership along one axis (numbered upward from the low
/// edge); curve strategies order records along the curve and split the
/// ordering into contiguous, near-equal chunks.
pub fn partition_points(
    houses: &[House],
    partitions: u32,
    strategy: PartitionStrategy,
) -> Result<Vec<PartitionId>, PartitionError> {
    if partitions == 0 {
        return Err(PartitionError::InvalidPartitionCount {
            requested: partitions,
        });
    }
    if houses.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(bad) = houses.iter().find(|h| !h.x.is_finite() || !h.y.is_finite()) {
        return Err(PartitionError::NonFiniteCoordinate { x: bad.x, y: bad.y });
    }

    let positions: Vec<Coord> = houses.iter().map(|h| Coord::new(h.x, h.y)).collect();
    match strategy {
        PartitionStrategy::Row => Ok(band_tags(&positions, partitions, Axis::Y)),
        PartitionStrategy::Col => Ok(band_tags(&positions, partitions, Axis::X)),
        PartitionStrategy::Hilbert | PartitionStrategy::Morton | PartitionStrategy::Geohash => {
            curve::ordered_chunk_tags(&positions, partitions, strategy)
        }
    }
}

/// Group tagged houses into per-partition scatter slots.
///
/// The result has `partitions + 1` entries indexed by partition number.
/// Slot 0 (the coordinator) is always `None`, and a partition that
/// received no records is `None` rather than an empty vector -- the
/// explicit sentinel every downstream concatenation step treats the same
/// as absent data.
#[must_use]
pub fn chunk_by_partition(
    houses: &[House],
    tags: &[PartitionId],
    partitions: u32,
) -> Vec<Option<Vec<House>>> {
    let slot_count = (partitions as usize).saturating_add(1);
    let mut slots: Vec<Option<Vec<House>>> = vec![None; slot_count];
    for (house, tag) in houses.iter().zip(tags) {
        if tag.is_coordinator() {
            continue;
        }
        if let Some(slot) = slots.get_mut(tag.index()) {
            slot.get_or_insert_with(Vec::new).push(*house);
        }
    }
    slots
}

/// Band tags for row/col point mode.
fn band_tags(positions: &[Coord], partitions: u32, axis: Axis) -> Vec<PartitionId> {
    // Positions are non-empty and finite; checked by the caller.
    let bounds = Bounds::from_coords(positions.iter().copied()).unwrap_or(Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 0.0,
        max_y: 0.0,
    });
    let min = bounds.min_along(axis);
    let max = bounds.max_along(axis);
    positions
        .iter()
        .map(|c| {
            let band = axis::band_index(c.along(axis), min, max, partitions);
            PartitionId::new(band.saturating_add(1))
        })
        .collect()
}

/// Curve ordering applied to whole shapes via their bounding-box centers.
fn curve_shape_chunks(
    shapes: &[Polygon],
    partitions: u32,
    strategy: PartitionStrategy,
) -> Result<Vec<ShapePartition>, PartitionError> {
    if shapes.is_empty() {
        return Err(PartitionError::MalformedGeometry {
            reason: String::from("no input shapes to partition"),
        });
    }
    let centers: Vec<Coord> = shapes.iter().map(|s| s.bounds().center()).collect();
    let tags = curve::ordered_chunk_tags(&centers, partitions, strategy)?;

    let mut grouped: Vec<Vec<Polygon>> = vec![Vec::new(); (partitions as usize).saturating_add(1)];
    for (shape, tag) in shapes.iter().zip(&tags) {
        if let Some(group) = grouped.get_mut(tag.index()) {
            group.push(shape.clone());
        }
    }

    Ok(grouped
        .into_iter()
        .enumerate()
        .filter(|(_, pieces)| !pieces.is_empty())
        .map(|(number, pieces)| ShapePartition {
            partition: PartitionId::new(u32::try_from(number).unwrap_or(u32::MAX)),
            pieces,
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use enclave_types::Race;

    use super::*;

    fn scattered_houses(count: usize, seed: u64) -> Vec<House> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let x: f64 = rng.random_range(-120.0..-115.0);
                let y: f64 = rng.random_range(33.0..39.0);
                if i % 10 == 0 {
                    House::empty(x, y)
                } else {
                    House::occupied(Race(u8::from(i % 2 == 0)), x, y)
                }
            })
            .collect()
    }

    #[test]
    fn every_strategy_partitions_completely() {
        let houses = scattered_houses(200, 7);
        for strategy in PartitionStrategy::ALL {
            for partitions in 1..=6_u32 {
                let tags = partition_points(&houses, partitions, strategy).unwrap();
                assert_eq!(tags.len(), houses.len());
                // Exactly once each: no coordinator tags, none out of range.
                for tag in &tags {
                    assert!(!tag.is_coordinator(), "{strategy} tagged the coordinator");
                    assert!(tag.value() <= partitions);
                }
                let slots = chunk_by_partition(&houses, &tags, partitions);
                let total: usize = slots.iter().flatten().map(Vec::len).sum();
                assert_eq!(total, houses.len(), "{strategy} lost records");
                assert!(slots.first().unwrap().is_none());
            }
        }
    }

    #[test]
    fn row_points_assign_by_y_interval() {
        let houses = vec![
            House::empty(0.3, 0.1),
            House::empty(0.9, 0.4),
            House::empty(0.2, 0.6),
            House::empty(0.7, 1.0),
        ];
        let tags = partition_points(&houses, 2, PartitionStrategy::Row).unwrap();
        assert_eq!(
            tags,
            vec![
                PartitionId::new(1),
                PartitionId::new(1),
                PartitionId::new(2),
                PartitionId::new(2),
            ]
        );
    }

    #[test]
    fn empty_partition_becomes_none_sentinel() {
        // Every point in the lower third: the upper row bands get nothing.
        let houses = vec![House::empty(0.0, 0.0), House::empty(1.0, 0.01)];
        let mut padded = houses.clone();
        padded.push(House::empty(0.5, 3.0));
        let tags = partition_points(&padded, 3, PartitionStrategy::Row).unwrap();
        let slots = chunk_by_partition(&padded, &tags, 3);
        assert!(slots.get(2).unwrap().is_none());
        let occupied_slots = slots.iter().flatten().count();
        assert_eq!(occupied_slots, 2);
    }

    #[test]
    fn zero_partitions_is_rejected() {
        let houses = scattered_houses(10, 1);
        assert!(matches!(
            partition_points(&houses, 0, PartitionStrategy::Row),
            Err(PartitionError::InvalidPartitionCount { .. })
        ));
        assert!(matches!(
            partition_shapes(&[], 0, PartitionStrategy::Row),
            Err(PartitionError::InvalidPartitionCount { .. })
        ));
    }

    #[test]
    fn curve_shape_split_keeps_every_polygon() {
        let shapes: Vec<Polygon> = (0..9)
            .map(|i| {
                let x = f64::from(i % 3) * 2.0;
                let y = f64::from(i / 3) * 2.0;
                Polygon::rectangle(x, y, x + 1.0, y + 1.0).unwrap()
            })
            .collect();
        let parts = partition_shapes(&shapes, 4, PartitionStrategy::Hilbert).unwrap();
        let total: usize = parts.iter().map(|p| p.pieces.len()).sum();
        assert_eq!(total, 9);
        for part in &parts {
            assert!(!part.partition.is_coordinator());
        }
    }

    #[test]
    fn curve_partitions_are_spatially_coherent() {
        // A 4x4 grid of points split 4 ways along the Hilbert curve keeps
        // each chunk inside one quadrant.
        let houses: Vec<House> = (0..16)
            .map(|i| House::empty(f64::from(i % 4), f64::from(i / 4)))
            .collect();
        let tags = partition_points(&houses, 4, PartitionStrategy::Hilbert).unwrap();
        for (house, tag) in houses.iter().zip(&tags) {
            let quadrant = match (house.x < 2.0, house.y < 2.0) {
                (true, true) => "ll",
                (false, true) => "lr",
                (true, false) => "ul",
                (false, false) => "ur",
            };
            let mates: Vec<&str> = houses
                .iter()
                .zip(&tags)
                .filter(|(_, t)| *t == tag)
                .map(|(h, _)| match (h.x < 2.0, h.y < 2.0) {
                    (true, true) => "ll",
                    (false, true) => "lr",
                    (true, false) => "ul",
                    (false, false) => "ur",
                })
                .collect();
            assert!(
                mates.iter().all(|m| *m == quadrant),
                "partition {tag} spans quadrants"
            );
        }
    }
}
