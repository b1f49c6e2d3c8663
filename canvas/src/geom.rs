#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

/// A point in either viewport or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

/// Bounding rectangle of the canvas surface in viewport coordinates.
///
/// `x` / `y` are the top-left corner as reported by the host; every clamp is
/// computed against `width` / `height` only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Top-left corner of the rectangle.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Convert a viewport-space point into canvas-local coordinates.
    #[must_use]
    pub fn to_local(&self, viewport: Point) -> Point {
        viewport - self.origin()
    }

    /// Center of the rectangle in canvas-local coordinates.
    #[must_use]
    pub fn local_center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Clamp a canvas-local position so an item with the given square
    /// footprint stays inside the rectangle.
    ///
    /// When the canvas is smaller than the footprint the upper bound goes
    /// negative; the lower bound of zero wins in that case.
    #[must_use]
    pub fn clamp(&self, pt: Point, footprint: f64) -> Point {
        Point {
            x: clamp_axis(pt.x, self.width - footprint),
            y: clamp_axis(pt.y, self.height - footprint),
        }
    }
}

fn clamp_axis(v: f64, max: f64) -> f64 {
    v.min(max).max(0.0)
}
