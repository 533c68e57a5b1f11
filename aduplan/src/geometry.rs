//! Axis-aligned rectangle model for the lot.
//!
//! Coordinates are feet with the origin at the lot's front-left corner,
//! x growing to the right and y growing toward the rear lot line.

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in lot coordinates. Width or depth may be negative for a
/// degenerate buildable area; nothing here clamps them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub depth: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, depth: f64) -> Self {
        Self { x, y, width, depth }
    }

    pub fn at(position: Point, width: f64, depth: f64) -> Self {
        Self::new(position.x, position.y, width, depth)
    }

    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.depth
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Area with negative extents counted as zero
    pub fn clamped_area(&self) -> f64 {
        self.width.max(0.0) * self.depth.max(0.0)
    }

    /// True when `inner` lies entirely inside `self`; shared edges count as inside.
    pub fn contains(&self, inner: &Rect) -> bool {
        inner.left() >= self.left()
            && inner.top() >= self.top()
            && inner.right() <= self.right()
            && inner.bottom() <= self.bottom()
    }

    /// Interior intersection test. Rectangles that only touch along an
    /// edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() <= other.left()
            || self.left() >= other.right()
            || self.bottom() <= other.top()
            || self.top() >= other.bottom())
    }

    /// Grow the rectangle by `margin` on all four sides.
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::from_edges(
            self.left() - margin,
            self.top() - margin,
            self.right() + margin,
            self.bottom() + margin,
        )
    }

    /// Clamp the origin of a `width` x `depth` box so it stays inside
    /// `self`. When the box cannot fit, it is pinned to the left/top edge.
    pub fn clamp_origin(&self, position: Point, width: f64, depth: f64) -> Point {
        let max_x = (self.right() - width).max(self.left());
        let max_y = (self.bottom() - depth).max(self.top());
        Point::new(
            position.x.clamp(self.left(), max_x),
            position.y.clamp(self.top(), max_y),
        )
    }
}

/// The lot rectangle itself
pub fn lot_rect(config: &Config) -> Rect {
    Rect::new(0.0, 0.0, config.lot_width, config.lot_depth)
}

/// Area left after subtracting setbacks. Not clamped: when setbacks
/// exceed the lot the result has negative extents and contains nothing.
pub fn buildable_area(config: &Config) -> Rect {
    Rect::from_edges(
        config.side_setback,
        config.front_setback,
        config.lot_width - config.side_setback,
        config.lot_depth - config.rear_setback,
    )
}

/// Derived lot numbers, all in feet / square feet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotMetrics {
    pub lot_area: f64,
    pub buildable_area_size: f64,
    pub adu_area: f64,
    pub coverage_percent: f64,
}

pub fn metrics(config: &Config) -> LotMetrics {
    let lot_area = config.lot_width * config.lot_depth;
    let adu_area = config.adu_width * config.adu_depth;
    let coverage_percent = if lot_area > 0.0 {
        adu_area / lot_area * 100.0
    } else {
        0.0
    };
    LotMetrics {
        lot_area,
        buildable_area_size: buildable_area(config).clamped_area(),
        adu_area,
        coverage_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitSystem;

    fn basic_config() -> Config {
        Config::default()
            .with_lot_width(65.0)
            .with_lot_depth(120.0)
            .with_front_setback(10.0)
            .with_rear_setback(5.0)
            .with_side_setback(4.0)
            .with_adu_width(20.0)
            .with_adu_depth(24.0)
    }

    #[test]
    fn test_buildable_area_edges() {
        let area = buildable_area(&basic_config());
        assert_eq!(area.left(), 4.0);
        assert_eq!(area.top(), 10.0);
        assert_eq!(area.right(), 61.0);
        assert_eq!(area.bottom(), 115.0);
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        let c = Rect::new(9.9, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&c));
    }

    #[test]
    fn test_obstacle_collision_scenario() {
        let adu = Rect::new(10.0, 10.0, 20.0, 24.0);
        let obstacle = Rect::new(15.0, 15.0, 10.0, 10.0);
        assert!(adu.overlaps(&obstacle));
    }

    #[test]
    fn test_degenerate_buildable_area() {
        let config = basic_config()
            .with_lot_width(15.0)
            .with_side_setback(10.0);
        let area = buildable_area(&config);
        assert!(area.width < 0.0);
        assert!(!area.contains(&Rect::new(5.0, 20.0, 1.0, 1.0)));
        assert_eq!(metrics(&config).buildable_area_size, 0.0);
    }

    #[test]
    fn test_metrics_basic_lot() {
        let m = metrics(&basic_config());
        assert_eq!(m.lot_area, 7800.0);
        assert_eq!(m.adu_area, 480.0);
        assert_eq!(m.buildable_area_size, 57.0 * 105.0);
        assert!((m.coverage_percent - 6.1538).abs() < 0.001);
    }

    #[test]
    fn test_coverage_ignores_display_units() {
        let imperial = metrics(&basic_config());
        let metric = metrics(&basic_config().with_units(UnitSystem::Metric));
        assert_eq!(imperial.coverage_percent, metric.coverage_percent);
    }

    #[test]
    fn test_clamp_origin_pins_oversized_box() {
        let bounds = Rect::from_edges(4.0, 10.0, 20.0, 30.0);
        assert_eq!(
            bounds.clamp_origin(Point::new(50.0, 50.0), 40.0, 10.0),
            Point::new(4.0, 20.0)
        );
    }
}
