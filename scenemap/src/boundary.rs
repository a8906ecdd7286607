//! Axis-aligned boundaries and the partition geometry built on them.

use serde::{Deserialize, Serialize};

use crate::errors::{MapError, MapResult};

/// The coordinate axis a node's volume is bisected along.
///
/// The split axis rotates with tree depth: `X → Y → Z → X …`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The next axis in the depth rotation.
    pub fn next(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

/// Which half of a bisected boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfSide {
    Lower,
    Upper,
}

/// How boundary `a` relates to boundary `b`.
///
/// Produced by [`Boundary::classify`]; the variants are checked in
/// declaration order, which is what resolves ties at shared faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// `a` is entirely disjoint from `b` on at least one axis
    AOutsideB,
    /// `a` fits entirely within `b`
    AInsideB,
    /// `b` fits entirely within `a`
    BInsideA,
    /// `a` and `b` partially overlap
    AOverlapsB,
}

/// An axis-aligned box in the world volume, defined by min/max per axis.
///
/// # Examples
///
/// ```rust
/// use scenemap::Boundary;
///
/// let world = Boundary::new(-100.0, -100.0, -100.0, 100.0, 100.0, 100.0);
/// assert!(world.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub xmin: f64,
    pub ymin: f64,
    pub zmin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zmax: f64,
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Boundary({}..{}, {}..{}, {}..{})",
            self.xmin, self.xmax, self.ymin, self.ymax, self.zmin, self.zmax
        )
    }
}

impl Boundary {
    /// Creates a new boundary from its six corner scalars.
    pub fn new(xmin: f64, ymin: f64, zmin: f64, xmax: f64, ymax: f64, zmax: f64) -> Boundary {
        Boundary {
            xmin,
            ymin,
            zmin,
            xmax,
            ymax,
            zmax,
        }
    }

    /// Rejects inside-out (`min > max` on any axis) and non-finite
    /// boundaries. Runs before any boundary is routed into the tree.
    pub fn validate(&self) -> MapResult<()> {
        let scalars = [
            self.xmin, self.ymin, self.zmin, self.xmax, self.ymax, self.zmax,
        ];
        if scalars.iter().any(|v| !v.is_finite()) {
            return Err(MapError::InvalidBoundary(format!(
                "non-finite coordinate in {self}"
            )));
        }
        if self.xmin > self.xmax || self.ymin > self.ymax || self.zmin > self.zmax {
            return Err(MapError::InvalidBoundary(format!("inside-out {self}")));
        }
        Ok(())
    }

    /// Classifies how `self` relates to `other`.
    ///
    /// The checks run in a fixed order: disjoint on any single axis wins,
    /// then `self` inside `other`, then `other` inside `self`, otherwise
    /// the boxes partially overlap. Boundary-touching faces count as
    /// containment, not disjointness, which is what routes an asset that
    /// ends exactly on a split plane.
    pub fn classify(&self, other: &Boundary) -> Intersection {
        let (a, b) = (self, other);
        if a.xmax < b.xmin
            || a.xmin > b.xmax
            || a.ymax < b.ymin
            || a.ymin > b.ymax
            || a.zmax < b.zmin
            || a.zmin > b.zmax
        {
            return Intersection::AOutsideB;
        }
        if a.xmax <= b.xmax
            && a.ymax <= b.ymax
            && a.zmax <= b.zmax
            && a.xmin >= b.xmin
            && a.ymin >= b.ymin
            && a.zmin >= b.zmin
        {
            return Intersection::AInsideB;
        }
        if a.xmax >= b.xmax
            && a.ymax >= b.ymax
            && a.zmax >= b.zmax
            && a.xmin <= b.xmin
            && a.ymin <= b.ymin
            && a.zmin <= b.zmin
        {
            return Intersection::BInsideA;
        }
        Intersection::AOverlapsB
    }

    /// Returns the lower or upper half of this boundary, bisected at the
    /// midpoint of the given axis. The other two axes are unchanged, so
    /// the two halves exactly tile the original volume.
    pub fn half(&self, axis: Axis, side: HalfSide) -> Boundary {
        let mut half = *self;
        match axis {
            Axis::X => {
                let mid = (self.xmin + self.xmax) / 2.0;
                match side {
                    HalfSide::Lower => half.xmax = mid,
                    HalfSide::Upper => half.xmin = mid,
                }
            }
            Axis::Y => {
                let mid = (self.ymin + self.ymax) / 2.0;
                match side {
                    HalfSide::Lower => half.ymax = mid,
                    HalfSide::Upper => half.ymin = mid,
                }
            }
            Axis::Z => {
                let mid = (self.zmin + self.zmax) / 2.0;
                match side {
                    HalfSide::Lower => half.zmax = mid,
                    HalfSide::Upper => half.zmin = mid,
                }
            }
        }
        half
    }
}
