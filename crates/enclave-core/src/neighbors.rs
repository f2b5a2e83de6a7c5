//! Spatial proximity index for neighbor discovery.
//!
//! A uniform bucket grid over the house coordinates. The cell edge equals
//! the query radius, so every neighbor of a point lives in the point's own
//! cell or one of the eight surrounding cells. Buckets are kept in a
//! `BTreeMap` so traversal order (and therefore every downstream
//! computation) is deterministic for identical input.

use std::collections::BTreeMap;

/// Errors emitted by the proximity index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Configuration values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Uniform grid over a set of positions, bucketed at the query radius.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    radius: f64,
    positions: Vec<(f64, f64)>,
    cells: BTreeMap<(i64, i64), Vec<usize>>,
}

impl NeighborGrid {
    /// Build the grid from positions with the given query radius.
    pub fn build(positions: &[(f64, f64)], radius: f64) -> Result<Self, IndexError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(IndexError::InvalidConfig("radius must be positive"));
        }
        let mut cells: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
        for (index, position) in positions.iter().enumerate() {
            cells
                .entry(cell_of(*position, radius))
                .or_default()
                .push(index);
        }
        Ok(Self {
            radius,
            positions: positions.to_vec(),
            cells,
        })
    }

    /// Adjacency lists: for every position, the indices of all other
    /// positions within the radius (inclusive).
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut lists: Vec<Vec<usize>> = vec![Vec::new(); self.positions.len()];
        let radius_sq = self.radius * self.radius;

        for ((cx, cy), members) in &self.cells {
            for dx in -1_i64..=1 {
                for dy in -1_i64..=1 {
                    let neighbor_cell = (cx.saturating_add(dx), cy.saturating_add(dy));
                    let Some(others) = self.cells.get(&neighbor_cell) else {
                        continue;
                    };
                    for &i in members {
                        for &j in others {
                            // Count each unordered pair once, then mirror.
                            if j <= i {
                                continue;
                            }
                            if self.within(i, j, radius_sq) {
                                if let Some(list) = lists.get_mut(i) {
                                    list.push(j);
                                }
                                if let Some(list) = lists.get_mut(j) {
                                    list.push(i);
                                }
                            }
                        }
                    }
                }
            }
        }

        for list in &mut lists {
            list.sort_unstable();
        }
        lists
    }

    /// Whether positions `i` and `j` sit within the query radius.
    fn within(&self, i: usize, j: usize, radius_sq: f64) -> bool {
        let (Some((xi, yi)), Some((xj, yj))) = (self.positions.get(i), self.positions.get(j))
        else {
            return false;
        };
        let dx = xi - xj;
        let dy = yi - yj;
        dx.mul_add(dx, dy * dy) <= radius_sq
    }
}

/// The grid cell containing a position.
#[allow(clippy::cast_possible_truncation)]
fn cell_of(position: (f64, f64), radius: f64) -> (i64, i64) {
    let (x, y) = position;
    ((x / radius).floor() as i64, (y / radius).floor() as i64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn brute_force(positions: &[(f64, f64)], radius: f64) -> Vec<Vec<usize>> {
        let radius_sq = radius * radius;
        positions
            .iter()
            .enumerate()
            .map(|(i, (xi, yi))| {
                positions
                    .iter()
                    .enumerate()
                    .filter(|(j, (xj, yj))| {
                        let dx = xi - xj;
                        let dy = yi - yj;
                        *j != i && dx.mul_add(dx, dy * dy) <= radius_sq
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(NeighborGrid::build(&[], 0.0).is_err());
        assert!(NeighborGrid::build(&[], -1.0).is_err());
        assert!(NeighborGrid::build(&[], f64::NAN).is_err());
    }

    #[test]
    fn matches_brute_force_on_random_points() {
        let mut rng = SmallRng::seed_from_u64(11);
        let positions: Vec<(f64, f64)> = (0..150)
            .map(|_| (rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0)))
            .collect();
        let radius = 0.8;
        let grid = NeighborGrid::build(&positions, radius).unwrap();
        assert_eq!(grid.adjacency(), brute_force(&positions, radius));
    }

    #[test]
    fn unit_grid_with_doubled_spacing_captures_diagonals() {
        // Four corners of a unit cell: with radius 2.0 every pair is
        // connected, diagonal included.
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let grid = NeighborGrid::build(&positions, 2.0).unwrap();
        let lists = grid.adjacency();
        for (i, list) in lists.iter().enumerate() {
            assert_eq!(list.len(), 3, "corner {i} should see the other three");
        }
    }

    #[test]
    fn isolated_point_has_no_neighbors() {
        let positions = vec![(0.0, 0.0), (100.0, 100.0)];
        let grid = NeighborGrid::build(&positions, 2.0).unwrap();
        let lists = grid.adjacency();
        assert!(lists.iter().all(Vec::is_empty));
    }
}
