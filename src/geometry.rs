//! Geometric kernel for layer planning and collision checks.
//!
//! All footprints are axis-aligned rectangles in the pallet plane. Rotation is
//! restricted to quarter turns, so every rotated footprint stays axis-aligned and
//! overlap tests reduce to interval comparisons.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Horizontal axis of the pallet plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// Box orientation on the deck.
///
/// `Deg0` keeps the box width along X, `Deg90` turns the box so its depth runs
/// along X.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
}

impl Orientation {
    pub const ALL: [Orientation; 2] = [Orientation::Deg0, Orientation::Deg90];

    /// Rotation angle in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
        }
    }

    /// Footprint (x extent, y extent) of a `width × depth` item in this orientation.
    #[inline]
    pub fn footprint(self, width: f64, depth: f64) -> (f64, f64) {
        match self {
            Orientation::Deg0 => (width, depth),
            Orientation::Deg90 => (depth, width),
        }
    }

    /// The other admissible orientation.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Deg0 => Orientation::Deg90,
            Orientation::Deg90 => Orientation::Deg0,
        }
    }

    /// Applies a relative orientation on top of this one.
    #[inline]
    pub fn compose(self, relative: Orientation) -> Self {
        match relative {
            Orientation::Deg0 => self,
            Orientation::Deg90 => self.toggled(),
        }
    }

    /// Rotates a local vector into the deck frame.
    #[inline]
    pub fn rotate_xy(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Orientation::Deg0 => (x, y),
            Orientation::Deg90 => (-y, x),
        }
    }
}

/// Quarter-turn rotation used by coordinate frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuarterTurn {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl QuarterTurn {
    pub const ALL: [QuarterTurn; 4] = [
        QuarterTurn::Deg0,
        QuarterTurn::Deg90,
        QuarterTurn::Deg180,
        QuarterTurn::Deg270,
    ];

    /// Rotation angle in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            QuarterTurn::Deg0 => 0,
            QuarterTurn::Deg90 => 90,
            QuarterTurn::Deg180 => 180,
            QuarterTurn::Deg270 => 270,
        }
    }

    /// The rotation that undoes this one.
    pub fn inverse(self) -> Self {
        match self {
            QuarterTurn::Deg0 => QuarterTurn::Deg0,
            QuarterTurn::Deg90 => QuarterTurn::Deg270,
            QuarterTurn::Deg180 => QuarterTurn::Deg180,
            QuarterTurn::Deg270 => QuarterTurn::Deg90,
        }
    }

    /// Whether X and Y extents swap under this rotation.
    pub fn swaps_axes(self) -> bool {
        matches!(self, QuarterTurn::Deg90 | QuarterTurn::Deg270)
    }

    /// Rotates a vector counter-clockwise. Exact for quarter turns.
    #[inline]
    pub fn rotate_xy(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            QuarterTurn::Deg0 => (x, y),
            QuarterTurn::Deg90 => (-y, x),
            QuarterTurn::Deg180 => (-x, -y),
            QuarterTurn::Deg270 => (y, -x),
        }
    }
}

/// Calculates the overlap of two intervals in one dimension.
///
/// # Example
/// ```
/// use stack_it_now::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// assert_eq!(overlap_1d(0.0, 1.0, 3.0, 8.0), 0.0);
/// ```
#[inline]
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Axis-aligned rectangle in the pallet plane, stored by its minimum corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub depth: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, depth: f64) -> Self {
        Self {
            x,
            y,
            width,
            depth,
        }
    }

    /// Creates a rectangle from its center and extents.
    #[inline]
    pub fn from_center(cx: f64, cy: f64, width: f64, depth: f64) -> Self {
        Self::new(cx - width / 2.0, cy - depth / 2.0, width, depth)
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y + self.depth
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.depth
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.depth / 2.0)
    }

    /// True when either extent collapses below `tolerance`.
    #[inline]
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.width <= tolerance || self.depth <= tolerance
    }

    /// Overlap area with another rectangle.
    pub fn overlap_area(&self, other: &Self) -> f64 {
        let overlap_x = overlap_1d(self.min_x(), self.max_x(), other.min_x(), other.max_x());
        let overlap_y = overlap_1d(self.min_y(), self.max_y(), other.min_y(), other.max_y());
        overlap_x * overlap_y
    }

    /// Checks whether two rectangles share interior area.
    ///
    /// Touching edges do not count; overlaps thinner than `tolerance` are ignored.
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        let overlap_x = overlap_1d(self.min_x(), self.max_x(), other.min_x(), other.max_x());
        let overlap_y = overlap_1d(self.min_y(), self.max_y(), other.min_y(), other.max_y());
        overlap_x > tolerance && overlap_y > tolerance
    }

    /// Checks whether `other` lies inside this rectangle.
    pub fn contains(&self, other: &Self, tolerance: f64) -> bool {
        other.min_x() >= self.min_x() - tolerance
            && other.min_y() >= self.min_y() - tolerance
            && other.max_x() <= self.max_x() + tolerance
            && other.max_y() <= self.max_y() + tolerance
    }

    /// Mirror image across the vertical line `x = axis`.
    #[inline]
    pub fn mirrored_x(&self, axis: f64) -> Self {
        Self::new(2.0 * axis - self.max_x(), self.y, self.width, self.depth)
    }

    /// Mirror image across the horizontal line `y = axis`.
    #[inline]
    pub fn mirrored_y(&self, axis: f64) -> Self {
        Self::new(self.x, 2.0 * axis - self.max_y(), self.width, self.depth)
    }

    /// Corners in the order SW, SE, NE, NW.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x(), self.min_y()),
            (self.max_x(), self.min_y()),
            (self.max_x(), self.max_y()),
            (self.min_x(), self.max_y()),
        ]
    }

    /// Edge midpoints in the order S, E, N, W.
    pub fn edge_midpoints(&self) -> [(f64, f64); 4] {
        let (cx, cy) = self.center();
        [
            (cx, self.min_y()),
            (self.max_x(), cy),
            (cx, self.max_y()),
            (self.min_x(), cy),
        ]
    }

    /// Grows the rectangle by `dx` left and right and `dy` below and above.
    #[inline]
    pub fn expanded(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.depth + 2.0 * dy,
        )
    }

    /// Parameter interval `(t_enter, t_exit)` of the open segment `from → to`
    /// inside the rectangle shrunk by `tolerance`, or `None` if it stays
    /// outside. Grazing contact along an edge is not reported. Uses the slab
    /// method.
    pub fn segment_clip(
        &self,
        from: (f64, f64),
        to: (f64, f64),
        tolerance: f64,
    ) -> Option<(f64, f64)> {
        let inner = self.expanded(-tolerance, -tolerance);
        if inner.is_degenerate(0.0) {
            return None;
        }

        let mut t_enter = 0.0_f64;
        let mut t_exit = 1.0_f64;
        let slabs = [
            (from.0, to.0 - from.0, inner.min_x(), inner.max_x()),
            (from.1, to.1 - from.1, inner.min_y(), inner.max_y()),
        ];

        for (origin, delta, lo, hi) in slabs {
            if delta.abs() < f64::EPSILON {
                if origin <= lo || origin >= hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - origin) / delta;
            let t2 = (hi - origin) / delta;
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            t_enter = t_enter.max(near);
            t_exit = t_exit.min(far);
            if t_enter >= t_exit {
                return None;
            }
        }
        Some((t_enter, t_exit))
    }
}
