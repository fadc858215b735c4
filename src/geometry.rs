//! Planar geometry helpers shared by the track model
//!
//! All exact geometry works on `geo::Point<f64>` in route-local metres.
//! Angles are radians; headings follow the mathematical convention
//! (0 = +x axis, counter-clockwise positive) and are kept wrapped to
//! `[-PI, PI]`.

use geo::Point;
use std::f64::consts::PI;

/// A world position in route-local metres.
pub type Location = Point<f64>;

/// How far a point may sit from a piece of track and still count as "on" it,
/// in metres. Shared by segment, junction and end-node hit tests.
pub const ON_TRACK_TOLERANCE: f64 = 1.0;

/// Squared form of [`ON_TRACK_TOLERANCE`], for comparisons against squared
/// distances.
pub const ON_TRACK_TOLERANCE_SQ: f64 = ON_TRACK_TOLERANCE * ON_TRACK_TOLERANCE;

/// Euclidean distance between two locations.
#[inline(always)]
pub fn distance(a: Location, b: Location) -> f64 {
    distance_sq(a, b).sqrt()
}

/// Squared euclidean distance between two locations.
#[inline(always)]
pub fn distance_sq(a: Location, b: Location) -> f64 {
    let dx = b.x() - a.x();
    let dy = b.y() - a.y();
    dx * dx + dy * dy
}

/// Wrap an angle to `[-PI, PI]`.
#[inline(always)]
pub fn wrap_angle(rad: f64) -> f64 {
    let mut a = rad % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Heading of the direction from `a` to `b`.
#[inline(always)]
pub fn heading_between(a: Location, b: Location) -> f64 {
    (b.y() - a.y()).atan2(b.x() - a.x())
}

/// The point reached by travelling `dist` metres from `origin` along
/// `heading`.
#[inline(always)]
pub fn point_at(origin: Location, heading: f64, dist: f64) -> Location {
    Point::new(
        origin.x() + dist * heading.cos(),
        origin.y() + dist * heading.sin(),
    )
}

/// Scalar parameter of the perpendicular projection of `p` onto the segment
/// `a -> b`.
///
/// The result is 0 at `a`, 1 at `b` and outside `[0, 1]` when the projection
/// falls beyond either end. Degenerate segments (`a == b`) yield 0.
#[inline]
pub fn project_param(p: Location, a: Location, b: Location) -> f64 {
    let abx = b.x() - a.x();
    let aby = b.y() - a.y();
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return 0.0;
    }
    ((p.x() - a.x()) * abx + (p.y() - a.y()) * aby) / len_sq
}

/// A located vector: a start and an end point in the world.
///
/// Used for the overall extent of a segment section or a whole train path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpanVector {
    pub start: Location,
    pub end: Location,
}

impl SpanVector {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Point halfway between start and end.
    pub fn midpoint(&self) -> Location {
        Point::new(
            (self.start.x() + self.end.x()) / 2.0,
            (self.start.y() + self.end.y()) / 2.0,
        )
    }

    /// Heading from start to end.
    pub fn heading(&self) -> f64 {
        heading_between(self.start, self.end)
    }

    /// Straight-line length from start to end.
    pub fn length(&self) -> f64 {
        distance(self.start, self.end)
    }

    /// The same span travelled the other way.
    pub fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < EPS);
        assert!((wrap_angle(-3.0 * PI) + PI).abs() < EPS);
        assert!((wrap_angle(0.5)).abs() - 0.5 < EPS);
        assert!((wrap_angle(2.0 * PI)).abs() < EPS);
    }

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((distance(a, b) - 5.0).abs() < EPS);
        assert!((distance_sq(a, b) - 25.0).abs() < EPS);
    }

    #[test]
    fn test_point_at_roundtrip() {
        let origin = Point::new(10.0, -5.0);
        let heading = 1.2345;
        let p = point_at(origin, heading, 42.0);
        assert!((distance(origin, p) - 42.0).abs() < 1e-6);
        assert!((heading_between(origin, p) - heading).abs() < 1e-9);
    }

    #[test]
    fn test_project_param() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((project_param(Point::new(5.0, 3.0), a, b) - 0.5).abs() < EPS);
        assert!(project_param(Point::new(-1.0, 0.0), a, b) < 0.0);
        assert!(project_param(Point::new(11.0, 0.0), a, b) > 1.0);
        // Degenerate segment projects to its own start.
        assert!((project_param(Point::new(1.0, 1.0), a, a)).abs() < EPS);
    }

    #[test]
    fn test_span_vector() {
        let span = SpanVector::new(Point::new(0.0, 0.0), Point::new(4.0, 0.0));
        assert!((span.midpoint().x() - 2.0).abs() < EPS);
        assert!((span.length() - 4.0).abs() < EPS);
        assert!((span.heading()).abs() < EPS);
        assert!((span.reversed().heading().abs() - PI).abs() < EPS);
    }
}
