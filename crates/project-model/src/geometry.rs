//! Frame-space geometry used by hit-testing and compositing.
//!
//! Coordinates are output-frame pixels: `(0.0, 0.0)` is the top-left corner
//! of the composited frame.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    /// Rectangle of the given size centered at `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    /// The center point of this rectangle.
    pub fn center(&self) -> Point2D {
        Point2D::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Largest rectangle with the aspect ratio of `content_w x content_h`
    /// that fits inside `self`, centered. The constraining dimension decides
    /// whether the result is letterboxed or pillarboxed.
    pub fn fit_inside(&self, content_w: f64, content_h: f64) -> Rect {
        if content_w <= 0.0 || content_h <= 0.0 || self.w <= 0.0 || self.h <= 0.0 {
            return Rect::centered(self.center().x, self.center().y, 0.0, 0.0);
        }
        let scale = (self.w / content_w).min(self.h / content_h);
        let c = self.center();
        Rect::centered(c.x, c.y, content_w * scale, content_h * scale)
    }

    /// Axis-aligned bounds of this rectangle rotated by `degrees` about `pivot`.
    pub fn rotated_bounds(&self, degrees: f64, pivot: Point2D) -> Rect {
        if degrees.rem_euclid(360.0) == 0.0 {
            return *self;
        }
        let corners = [
            Point2D::new(self.x, self.y),
            Point2D::new(self.right(), self.y),
            Point2D::new(self.x, self.bottom()),
            Point2D::new(self.right(), self.bottom()),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for corner in corners {
            let r = corner.rotate_about(pivot, degrees);
            min_x = min_x.min(r.x);
            min_y = min_y.min(r.y);
            max_x = max_x.max(r.x);
            max_y = max_y.max(r.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// A 2D point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Rotate clockwise (screen coordinates, y down) about `pivot`.
    pub fn rotate_about(&self, pivot: Point2D, degrees: f64) -> Point2D {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        Point2D {
            x: pivot.x + dx * cos - dy * sin,
            y: pivot.y + dx * sin + dy * cos,
        }
    }
}

/// Output frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The whole frame as a rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    /// Convert percentage coordinates (0–100) to frame pixels.
    pub fn from_percent(&self, x_pct: f64, y_pct: f64) -> Point2D {
        Point2D::new(
            x_pct / 100.0 * self.width as f64,
            y_pct / 100.0 * self.height as f64,
        )
    }

    /// Convert frame pixels to percentage coordinates (0–100).
    pub fn to_percent(&self, p: Point2D) -> (f64, f64) {
        let w = (self.width as f64).max(1.0);
        let h = (self.height as f64).max(1.0);
        (p.x / w * 100.0, p.y / h * 100.0)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_inside_pillarbox() {
        let frame = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        // 4:3 content inside 16:9 frame is height constrained.
        let fit = frame.fit_inside(800.0, 600.0);
        assert!((fit.h - 1080.0).abs() < 1e-9);
        assert!((fit.w - 1440.0).abs() < 1e-9);
        assert!((fit.x - 240.0).abs() < 1e-9);
        assert_eq!(fit.y, 0.0);
    }

    #[test]
    fn test_fit_inside_letterbox() {
        let frame = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        let fit = frame.fit_inside(1920.0, 1080.0);
        assert!((fit.w - 1000.0).abs() < 1e-9);
        assert!((fit.h - 562.5).abs() < 1e-9);
        assert!((fit.center().y - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_inside_degenerate_content() {
        let frame = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(frame.fit_inside(0.0, 10.0).area(), 0.0);
    }

    #[test]
    fn test_rotated_bounds_quarter_turn() {
        let r = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = r.rotated_bounds(90.0, r.center());
        assert!((b.w - 50.0).abs() < 1e-9);
        assert!((b.h - 100.0).abs() < 1e-9);
        assert!((b.center().x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let r = Rect::new(10.0, 10.0, 10.0, 10.0);
        assert!(r.contains(Point2D::new(10.0, 20.0)));
        assert!(!r.contains(Point2D::new(9.99, 15.0)));
    }

    #[test]
    fn test_percent_round_trip() {
        let frame = FrameSize::new(1280, 720);
        let p = frame.from_percent(50.0, 25.0);
        assert_eq!(p, Point2D::new(640.0, 180.0));
        let (x, y) = frame.to_percent(p);
        assert!((x - 50.0).abs() < 1e-9);
        assert!((y - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }
}
