//! Seed population spawner.
//!
//! Stand-in for the upstream population-generation pipeline: lays a
//! regular grid of candidate positions at `spacing` over each territory,
//! keeps the points inside the territory's polygons, samples occupancy at
//! `1 - empty_ratio`, and assigns race labels over the occupied sample at
//! the demographic ratio. The core crates never depend on this module;
//! they accept ready-made house collections from whatever produced them.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use enclave_partition::geometry::Polygon;
use enclave_types::{House, Race};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// One rectangular part of the study region.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RegionRect {
    /// Left edge.
    pub min_x: f64,
    /// Bottom edge.
    pub min_y: f64,
    /// Right edge.
    pub max_x: f64,
    /// Top edge.
    pub max_y: f64,
}

/// Configuration for the population spawner, loaded from the `population`
/// section of `enclave-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// Fraction of generated cells left without an occupant.
    #[serde(default = "default_empty_ratio")]
    pub empty_ratio: f64,

    /// Fraction of occupants assigned the majority label (race 0); the
    /// remainder get race 1.
    #[serde(default = "default_demographic_ratio")]
    pub demographic_ratio: f64,

    /// Rectangular parts making up the study region. Multi-part regions
    /// give the curve-based shape strategies something to order.
    #[serde(default = "default_region")]
    pub region: Vec<RegionRect>,
}

impl PopulationConfig {
    /// Check every value's domain.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("empty_ratio", self.empty_ratio),
            ("demographic_ratio", self.demographic_ratio),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(EngineError::Spawner {
                    message: format!("population.{name} must be within [0, 1], got {value}"),
                });
            }
        }
        if self.region.is_empty() {
            return Err(EngineError::Spawner {
                message: String::from("population.region must have at least one part"),
            });
        }
        Ok(())
    }

    /// The region parts as polygons.
    pub fn region_polygons(&self) -> Result<Vec<Polygon>, EngineError> {
        self.region
            .iter()
            .map(|r| {
                Polygon::rectangle(r.min_x, r.min_y, r.max_x, r.max_y).map_err(|source| {
                    EngineError::Spawner {
                        message: format!("invalid region part: {source}"),
                    }
                })
            })
            .collect()
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            empty_ratio: default_empty_ratio(),
            demographic_ratio: default_demographic_ratio(),
            region: default_region(),
        }
    }
}

const fn default_empty_ratio() -> f64 {
    0.1
}

const fn default_demographic_ratio() -> f64 {
    0.5
}

fn default_region() -> Vec<RegionRect> {
    vec![RegionRect {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 12.0,
        max_y: 8.0,
    }]
}

// -----------------------------------------------------------------------
// Spawning
// -----------------------------------------------------------------------

/// Populate one territory with houses.
///
/// Grid positions are anchored at the floor/ceil of each polygon's
/// bounds, matching how the population the model was calibrated against
/// was generated, so `spacing` keeps its meaning for neighbor discovery.
pub fn populate_territory<R: Rng + ?Sized>(
    pieces: &[Polygon],
    spacing: f64,
    config: &PopulationConfig,
    rng: &mut R,
) -> Result<Vec<House>, EngineError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(EngineError::Spawner {
            message: format!("spacing must be positive, got {spacing}"),
        });
    }

    let mut positions: Vec<(f64, f64)> = Vec::new();
    for polygon in pieces {
        grid_positions_into(polygon, spacing, &mut positions);
    }

    let occupancy = sampled_mask(positions.len(), 1.0 - config.empty_ratio, rng);
    let occupied_count = occupancy.iter().filter(|o| **o).count();
    let mut minority = sampled_mask(occupied_count, 1.0 - config.demographic_ratio, rng);
    minority.reverse(); // consume with pop() in position order

    let houses: Vec<House> = positions
        .iter()
        .zip(&occupancy)
        .map(|((x, y), occupied)| {
            if *occupied {
                let label = u8::from(minority.pop().unwrap_or(false));
                House::occupied(Race(label), *x, *y)
            } else {
                House::empty(*x, *y)
            }
        })
        .collect();

    info!(
        cells = houses.len(),
        occupied = occupied_count,
        "Territory populated"
    );
    Ok(houses)
}

/// Append the grid positions falling inside one polygon.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_positions_into(polygon: &Polygon, spacing: f64, positions: &mut Vec<(f64, f64)>) {
    let bounds = polygon.bounds();
    let start_x = bounds.min_x.floor();
    let stop_x = bounds.max_x.ceil();
    let start_y = bounds.min_y.floor();
    let stop_y = bounds.max_y.ceil();

    let steps_x = (((stop_x - start_x) / spacing).ceil().max(0.0)) as u64;
    let steps_y = (((stop_y - start_y) / spacing).ceil().max(0.0)) as u64;

    for i in 0..steps_x {
        #[allow(clippy::cast_precision_loss)]
        let x = (i as f64).mul_add(spacing, start_x);
        if x >= stop_x {
            break;
        }
        for j in 0..steps_y {
            #[allow(clippy::cast_precision_loss)]
            let y = (j as f64).mul_add(spacing, start_y);
            if y >= stop_y {
                break;
            }
            if polygon.contains(x, y) {
                positions.push((x, y));
            }
        }
    }
}

/// A shuffled boolean mask with `round(size * ratio)` entries set.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn sampled_mask<R: Rng + ?Sized>(size: usize, ratio: f64, rng: &mut R) -> Vec<bool> {
    let set = (((size as f64) * ratio).round().max(0.0) as usize).min(size);
    let mut mask: Vec<bool> = (0..size).map(|i| i < set).collect();
    mask.shuffle(rng);
    mask
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn square_region() -> PopulationConfig {
        PopulationConfig {
            empty_ratio: 0.2,
            demographic_ratio: 0.5,
            region: vec![RegionRect {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 10.0,
                max_y: 10.0,
            }],
        }
    }

    #[test]
    fn population_fills_the_region_at_spacing() {
        let config = square_region();
        let pieces = config.region_polygons().unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let houses = populate_territory(&pieces, 1.0, &config, &mut rng).unwrap();

        // Interior grid positions of a 10x10 square at unit spacing.
        assert!(!houses.is_empty());
        for house in &houses {
            assert!(house.x >= 0.0 && house.x < 10.0);
            assert!(house.y >= 0.0 && house.y < 10.0);
        }
    }

    #[test]
    fn occupancy_tracks_the_empty_ratio() {
        let config = square_region();
        let pieces = config.region_polygons().unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let houses = populate_territory(&pieces, 0.5, &config, &mut rng).unwrap();

        let occupied = houses.iter().filter(|h| h.is_occupied()).count();
        let expected = ((houses.len() as f64) * 0.8).round();
        assert!((occupied as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn both_races_appear_in_a_balanced_population() {
        let config = square_region();
        let pieces = config.region_polygons().unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        let houses = populate_territory(&pieces, 1.0, &config, &mut rng).unwrap();

        let zeros = houses.iter().filter(|h| h.race == Some(Race(0))).count();
        let ones = houses.iter().filter(|h| h.race == Some(Race(1))).count();
        assert!(zeros > 0 && ones > 0);
        // Balanced demographic ratio keeps the two labels close.
        assert!(zeros.abs_diff(ones) <= 1);
    }

    #[test]
    fn seeded_spawns_are_reproducible() {
        let config = square_region();
        let pieces = config.region_polygons().unwrap();
        let mut rng_a = SmallRng::seed_from_u64(5);
        let mut rng_b = SmallRng::seed_from_u64(5);
        let a = populate_territory(&pieces, 1.0, &config, &mut rng_a).unwrap();
        let b = populate_territory(&pieces, 1.0, &config, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        let mut config = square_region();
        config.empty_ratio = 1.5;
        assert!(config.validate().is_err());
        config.empty_ratio = 0.1;
        config.region.clear();
        assert!(config.validate().is_err());
    }
}
