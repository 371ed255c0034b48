//! Shared geometry types for the skyruler measurement overlay.
//!
//! All positions are in overlay coordinates: pixels from the top-left
//! corner of the viewport that hosts the image. Natural (full-resolution)
//! image pixels only appear inside [`ImageBounds::to_natural`].

use serde::{Deserialize, Serialize};

/// A 2D point in overlay coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Arithmetic mean of two points.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(f64::midpoint(self.x, other.x), f64::midpoint(self.y, other.y))
    }

    /// This point shifted by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Vector from `self` to `other` as `(dx, dy)`.
    #[must_use]
    pub fn delta_to(self, other: Self) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }

    /// Shortest distance from this point to the segment `a`-`b`.
    #[must_use]
    pub fn distance_to_segment(self, a: Self, b: Self) -> f64 {
        let len_sq = a.distance_squared(b);
        if len_sq <= f64::EPSILON {
            return self.distance(a);
        }
        let (abx, aby) = a.delta_to(b);
        let (apx, apy) = a.delta_to(self);
        let t = (apx.mul_add(abx, apy * aby) / len_sq).clamp(0.0, 1.0);
        self.distance(a.offset(abx * t, aby * t))
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Centre of a rectangle of this size anchored at the origin.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width (non-negative).
    pub width: f64,
    /// Height (non-negative).
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size centred on `center`.
    #[must_use]
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    /// Smallest rectangle containing both points.
    #[must_use]
    pub fn spanning(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Right edge.
    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns `true` if `p` lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    /// Overlap extents `(x, y)` with another rectangle, or `None` if
    /// the two do not intersect with positive area.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Option<(f64, f64)> {
        let ox = self.max_x().min(other.max_x()) - self.x.max(other.x);
        let oy = self.max_y().min(other.max_y()) - self.y.max(other.y);
        (ox > 0.0 && oy > 0.0).then_some((ox, oy))
    }
}

/// A celestial coordinate.
///
/// Right ascension is stored in **hours** (0-24) and declination in
/// **degrees** (-90..+90). The two use different units on purpose; see
/// [`crate::transform::angular_distance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Celestial {
    /// Right ascension in hours.
    pub ra: f64,
    /// Declination in degrees.
    pub dec: f64,
}

impl Celestial {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

impl From<(f64, f64)> for Celestial {
    fn from((ra, dec): (f64, f64)) -> Self {
        Self::new(ra, dec)
    }
}

/// Where the host image is displayed, and how large it really is.
///
/// `rect` is the displayed image rectangle in overlay coordinates;
/// `natural` is the full-resolution pixel size the plate solution was
/// computed against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBounds {
    /// Displayed image rectangle in overlay coordinates.
    pub rect: Rect,
    /// Natural image size in pixels.
    pub natural: Size,
}

impl ImageBounds {
    /// Convert an overlay point into natural image pixels.
    ///
    /// Returns `None` when the displayed rectangle is degenerate.
    #[must_use]
    pub fn to_natural(&self, p: Point) -> Option<Point> {
        if self.rect.width <= 0.0 || self.rect.height <= 0.0 {
            return None;
        }
        let sx = self.natural.width / self.rect.width;
        let sy = self.natural.height / self.rect.height;
        Some(Point::new((p.x - self.rect.x) * sx, (p.y - self.rect.y) * sy))
    }
}
