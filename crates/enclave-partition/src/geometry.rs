//! Planar geometry primitives for partitioning.
//!
//! The partitioner works on bare rings of `f64` vertices. Loading real
//! shapefiles (and any coordinate-reference-system handling) happens
//! upstream; by the time geometry reaches this crate it is a list of
//! [`Polygon`] values in one shared planar coordinate space.

use crate::error::PartitionError;

/// Area below which a clipped ring is considered degenerate.
const AREA_EPSILON: f64 = 1e-12;

/// A point in the shared planar coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Coord {
    /// Construct a coordinate pair.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The component along the given axis.
    #[must_use]
    pub const fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

/// The axis a cut line or band runs across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Split positions by their X coordinate (column bands).
    X,
    /// Split positions by their Y coordinate (row bands).
    Y,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest X covered.
    pub min_x: f64,
    /// Smallest Y covered.
    pub min_y: f64,
    /// Largest X covered.
    pub max_x: f64,
    /// Largest Y covered.
    pub max_y: f64,
}

impl Bounds {
    /// The bounding box of a coordinate sequence, or `None` when empty.
    pub fn from_coords<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coord>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for c in iter {
            bounds.min_x = bounds.min_x.min(c.x);
            bounds.min_y = bounds.min_y.min(c.y);
            bounds.max_x = bounds.max_x.max(c.x);
            bounds.max_y = bounds.max_y.max(c.y);
        }
        Some(bounds)
    }

    /// Grow to cover another bounding box.
    pub fn merge(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// The lower bound along the given axis.
    #[must_use]
    pub const fn min_along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.min_x,
            Axis::Y => self.min_y,
        }
    }

    /// The upper bound along the given axis.
    #[must_use]
    pub const fn max_along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.max_x,
            Axis::Y => self.max_y,
        }
    }

    /// Midpoint of the box.
    #[must_use]
    pub fn center(&self) -> Coord {
        Coord::new(
            self.min_x.midpoint(self.max_x),
            self.min_y.midpoint(self.max_y),
        )
    }
}

/// A simple polygon described by its exterior ring.
///
/// The ring is stored open (the closing edge back to the first vertex is
/// implicit) and must have at least three finite vertices enclosing a
/// non-degenerate area. Holes are not modeled; the upstream loader
/// explodes multi-part geometries into separate polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<Coord>,
}

impl Polygon {
    /// Validate and wrap an exterior ring.
    pub fn new(exterior: Vec<Coord>) -> Result<Self, PartitionError> {
        if exterior.len() < 3 {
            return Err(PartitionError::MalformedGeometry {
                reason: format!("ring has {} vertices, need at least 3", exterior.len()),
            });
        }
        if let Some(bad) = exterior
            .iter()
            .find(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(PartitionError::MalformedGeometry {
                reason: format!("ring contains non-finite vertex ({}, {})", bad.x, bad.y),
            });
        }
        let polygon = Self { exterior };
        if polygon.area() <= AREA_EPSILON {
            return Err(PartitionError::MalformedGeometry {
                reason: String::from("ring encloses no area"),
            });
        }
        Ok(polygon)
    }

    /// An axis-aligned rectangle.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, PartitionError> {
        Self::new(vec![
            Coord::new(min_x, min_y),
            Coord::new(max_x, min_y),
            Coord::new(max_x, max_y),
            Coord::new(min_x, max_y),
        ])
    }

    /// The exterior ring, open (no repeated closing vertex).
    #[must_use]
    pub fn exterior(&self) -> &[Coord] {
        &self.exterior
    }

    /// Closed-ring edge pairs `(from, to)`, including the closing edge.
    fn edges(&self) -> impl Iterator<Item = (Coord, Coord)> + '_ {
        let wrapped = self.exterior.iter().cycle().skip(1);
        self.exterior.iter().zip(wrapped).map(|(a, b)| (*a, *b))
    }

    /// The polygon's bounding box.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        // The constructor guarantees at least three vertices.
        Bounds::from_coords(self.exterior.iter().copied()).unwrap_or(Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        })
    }

    /// Enclosed area via the shoelace formula.
    #[must_use]
    pub fn area(&self) -> f64 {
        let twice: f64 = self
            .edges()
            .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
            .sum();
        twice.abs() / 2.0
    }

    /// Even-odd containment test for a point.
    ///
    /// Points exactly on an edge follow the even-odd crossing rule and are
    /// not guaranteed either way; callers sampling a regular grid jitter
    /// by construction (the grid is anchored at floor/ceil of the bounds).
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            let crosses = (a.y > y) != (b.y > y);
            if crosses {
                let slope_x = (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x;
                if x < slope_x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// Clip a polygon to the half-plane on one side of an axis-aligned cut.
///
/// Returns `None` when the surviving region is degenerate (fewer than
/// three vertices or effectively zero area). Standard Sutherland-Hodgman
/// against a single clip edge.
#[must_use]
pub fn clip_half_plane(polygon: &Polygon, axis: Axis, cut: f64, keep_above: bool) -> Option<Polygon> {
    let inside = |c: &Coord| {
        if keep_above {
            c.along(axis) >= cut
        } else {
            c.along(axis) <= cut
        }
    };

    let exterior = polygon.exterior();
    let mut clipped: Vec<Coord> = Vec::with_capacity(exterior.len().saturating_add(2));
    let wrapped = exterior.iter().cycle().skip(1);
    for (a, b) in exterior.iter().zip(wrapped) {
        let a_in = inside(a);
        let b_in = inside(b);
        if a_in {
            clipped.push(*a);
        }
        if a_in != b_in {
            clipped.push(intersect_with_cut(*a, *b, axis, cut));
        }
    }

    Polygon::new(clipped).ok()
}

/// The point where edge `a -> b` crosses the cut line.
fn intersect_with_cut(a: Coord, b: Coord, axis: Axis, cut: f64) -> Coord {
    let (a_along, b_along) = (a.along(axis), b.along(axis));
    let span = b_along - a_along;
    // Callers only ask for an intersection when the edge straddles the
    // cut, so `span` is non-zero there; guard anyway for grazing edges.
    let t = if span.abs() > f64::EPSILON {
        (cut - a_along) / span
    } else {
        0.0
    };
    match axis {
        Axis::X => Coord::new(cut, t.mul_add(b.y - a.y, a.y)),
        Axis::Y => Coord::new(t.mul_add(b.x - a.x, a.x), cut),
    }
}
