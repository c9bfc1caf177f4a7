//! Pixel-space geometry for keypoints and body framing.
//!
//! Image coordinates: `x` grows to the right, `y` grows downward, so a
//! positive vertical motion means the point is descending.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A 2D point in frame-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Arithmetic mean of two points.
    pub fn midpoint(a: &Point2D, b: &Point2D) -> Point2D {
        Point2D {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        }
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Point2D, b: &Point2D, t: f64) -> Point2D {
        let t = t.clamp(0.0, 1.0);
        Point2D {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }
}

/// A per-frame displacement (velocity) or change of displacement
/// (acceleration).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    pub dx: f64,
    pub dy: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

impl Sub for Point2D {
    type Output = Vector2D;

    fn sub(self, rhs: Point2D) -> Vector2D {
        Vector2D {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, rhs: Vector2D) -> Vector2D {
        Vector2D {
            dx: self.dx - rhs.dx,
            dy: self.dy - rhs.dy,
        }
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, rhs: Vector2D) -> Vector2D {
        Vector2D {
            dx: self.dx + rhs.dx,
            dy: self.dy + rhs.dy,
        }
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, rhs: f64) -> Vector2D {
        Vector2D {
            dx: self.dx * rhs,
            dy: self.dy * rhs,
        }
    }
}

/// Axis-aligned body bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Ratio reported when the box has no width.
    pub const AMBIGUOUS_RATIO: f64 = 1.0;

    /// Smallest box containing every point. `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = Point2D>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| BoundingBox {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// `height / width`, or [`BoundingBox::AMBIGUOUS_RATIO`] when the box
    /// has no width.
    pub fn height_width_ratio(&self) -> f64 {
        let width = self.width();
        if width > 0.0 {
            self.height() / width
        } else {
            Self::AMBIGUOUS_RATIO
        }
    }
}
