//! Track segments: one straight or circular-arc piece of a track node
//!
//! A segment owns its exact geometry and hit testing. Segments are immutable
//! value objects; trimming produces an independent copy and never mutates the
//! original. Each segment knows the track node it belongs to and its
//! vector-section index within that node, which is how path reconstruction
//! matches waypoints to topology.

use crate::geometry::{
    self, Location, ON_TRACK_TOLERANCE_SQ, distance_sq, heading_between, point_at, project_param,
    wrap_angle,
};
use crate::node::TrackNodeId;
use crate::tile::Tiled;
use std::f64::consts::{FRAC_PI_2, TAU};

/// A single straight or curved piece of track.
///
/// For curved segments `length == radius * |angle|`; for straight ones
/// `length` equals the euclidean distance from start to end. `direction` is
/// the travel heading at the start point, wrapped to `[-PI, PI]`.
#[derive(Clone, Debug)]
pub struct TrackSegment {
    start: Location,
    end: Location,
    direction: f64,
    length: f64,
    curved: bool,
    radius: f64,
    /// Signed arc angle in radians; positive turns counter-clockwise.
    /// Zero for straight segments.
    angle: f64,
    node: TrackNodeId,
    vector_index: usize,
    /// Arc centre; only present for curved segments.
    center: Option<Location>,
    /// Heading from the centre to the start point.
    center_to_start: f64,
    /// Heading from the centre to the end point.
    center_to_end: f64,
}

impl TrackSegment {
    /// Build a straight segment from its start point and travel heading.
    pub fn new_straight(
        node: TrackNodeId,
        vector_index: usize,
        start: Location,
        direction: f64,
        length: f64,
    ) -> Self {
        let direction = wrap_angle(direction);
        Self {
            start,
            end: point_at(start, direction, length),
            direction,
            length,
            curved: false,
            radius: 0.0,
            angle: 0.0,
            node,
            vector_index,
            center: None,
            center_to_start: 0.0,
            center_to_end: 0.0,
        }
    }

    /// Build a curved segment from its start point, travel heading, radius
    /// and signed arc angle (positive = counter-clockwise).
    pub fn new_curved(
        node: TrackNodeId,
        vector_index: usize,
        start: Location,
        direction: f64,
        radius: f64,
        angle: f64,
    ) -> Self {
        let direction = wrap_angle(direction);
        if angle == 0.0 || radius <= 0.0 {
            // An arc with no sweep is a zero-length segment in disguise.
            return Self::new_straight(node, vector_index, start, direction, 0.0);
        }
        let side = angle.signum();
        let center = point_at(start, direction + side * FRAC_PI_2, radius);
        let center_to_start = wrap_angle(direction - side * FRAC_PI_2);
        let center_to_end = wrap_angle(center_to_start + angle);
        let end = point_at(center, center_to_end, radius);
        Self {
            start,
            end,
            direction,
            length: radius * angle.abs(),
            curved: true,
            radius,
            angle,
            node,
            vector_index,
            center: Some(center),
            center_to_start,
            center_to_end,
        }
    }

    /// A zero-length placeholder used when the referenced track-section
    /// definition is missing from the source catalog.
    pub fn degenerate(
        node: TrackNodeId,
        vector_index: usize,
        start: Location,
        direction: f64,
    ) -> Self {
        Self::new_straight(node, vector_index, start, direction, 0.0)
    }

    pub fn start(&self) -> Location {
        self.start
    }

    pub fn end(&self) -> Location {
        self.end
    }

    /// Travel heading at the start point.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_curved(&self) -> bool {
        self.curved
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Signed arc angle; zero for straight segments.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Arc centre for curved segments.
    pub fn center(&self) -> Option<Location> {
        self.center
    }

    /// The track node this segment belongs to.
    pub fn node(&self) -> TrackNodeId {
        self.node
    }

    /// Index of this vector section within its track node.
    pub fn vector_index(&self) -> usize {
        self.vector_index
    }

    /// Squared distance from `point` to this segment, or `None` when the
    /// point is not within the shared tolerance of the segment's sweep or an
    /// endpoint.
    pub fn distance_sq(&self, point: Location) -> Option<f64> {
        if self.curved {
            let center = self.center.expect("curved segment has a centre");
            let point_heading = heading_between(center, point);
            if self.arc_contains(point_heading) {
                let radial = distance_sq(center, point).sqrt() - self.radius;
                let d = radial * radial;
                if d <= ON_TRACK_TOLERANCE_SQ {
                    return Some(d);
                }
            }
        } else if self.length > 0.0 {
            let t = project_param(point, self.start, self.end);
            if (0.0..=1.0).contains(&t) {
                let foot = geometry::point_at(
                    self.start,
                    heading_between(self.start, self.end),
                    t * self.length,
                );
                let d = distance_sq(point, foot);
                if d <= ON_TRACK_TOLERANCE_SQ {
                    return Some(d);
                }
            }
        }
        self.endpoint_distance_sq(point)
    }

    /// Fallback hit test against the two endpoints, bounded by the shared
    /// tolerance.
    fn endpoint_distance_sq(&self, point: Location) -> Option<f64> {
        let to_start = distance_sq(point, self.start);
        let to_end = distance_sq(point, self.end);
        let best = to_start.min(to_end);
        if best <= ON_TRACK_TOLERANCE_SQ {
            Some(best)
        } else {
            None
        }
    }

    /// Whether a heading from the arc centre falls within the swept range.
    fn arc_contains(&self, heading: f64) -> bool {
        let sweep = self.angle.abs();
        let delta = if self.angle > 0.0 {
            (heading - self.center_to_start).rem_euclid(TAU)
        } else {
            (self.center_to_start - heading).rem_euclid(TAU)
        };
        delta <= sweep
    }

    /// Travelled distance from the start to the projection of `point` onto
    /// this segment, clamped to `[0, length]`.
    pub fn offset_of(&self, point: Location) -> f64 {
        if self.curved {
            let center = self.center.expect("curved segment has a centre");
            let heading = heading_between(center, point);
            let sweep = self.angle.abs();
            let delta = if self.angle > 0.0 {
                (heading - self.center_to_start).rem_euclid(TAU)
            } else {
                (self.center_to_start - heading).rem_euclid(TAU)
            };
            if delta <= sweep {
                delta * self.radius
            } else if delta - sweep < TAU - delta {
                // Nearer the far end than the start.
                self.length
            } else {
                0.0
            }
        } else {
            let t = project_param(point, self.start, self.end).clamp(0.0, 1.0);
            t * self.length
        }
    }

    /// World position after travelling `offset` metres from the start.
    pub fn location_at(&self, offset: f64) -> Location {
        let offset = offset.clamp(0.0, self.length);
        if self.curved {
            let center = self.center.expect("curved segment has a centre");
            let side = self.angle.signum();
            let heading = self.center_to_start + side * offset / self.radius;
            point_at(center, heading, self.radius)
        } else {
            point_at(self.start, self.direction, offset)
        }
    }

    /// Travel heading after travelling `offset` metres from the start.
    pub fn direction_at(&self, offset: f64) -> f64 {
        if self.curved {
            let offset = offset.clamp(0.0, self.length);
            let side = self.angle.signum();
            wrap_angle(self.direction + side * offset / self.radius)
        } else {
            self.direction
        }
    }

    /// Trim to the sub-segment of the given `length`, starting `offset`
    /// metres in. With `from_end` set both distances are measured backwards
    /// from the end instead; the result still runs in the original travel
    /// direction.
    pub fn trim_from_offset(&self, offset: f64, length: f64, from_end: bool) -> TrackSegment {
        let start_offset = if from_end {
            (self.length - offset - length).max(0.0)
        } else {
            offset.clamp(0.0, self.length)
        };
        let length = length.clamp(0.0, self.length - start_offset);
        let start = self.location_at(start_offset);
        let direction = self.direction_at(start_offset);
        if self.curved {
            let side = self.angle.signum();
            TrackSegment::new_curved(
                self.node,
                self.vector_index,
                start,
                direction,
                self.radius,
                side * length / self.radius,
            )
        } else {
            TrackSegment::new_straight(self.node, self.vector_index, start, direction, length)
        }
    }

    /// Trim to the span between the projections of two boundary points.
    ///
    /// The returned segment always runs in the original travel direction;
    /// the flag reports whether travelling `p1 -> p2` runs against it. An
    /// exact tie prefers forward traversal.
    pub fn trim_between(&self, p1: Location, p2: Location) -> (TrackSegment, bool) {
        let o1 = self.offset_of(p1);
        let o2 = self.offset_of(p2);
        let reversed = o1 > o2;
        let (lo, hi) = if reversed { (o2, o1) } else { (o1, o2) };
        (self.trim_from_offset(lo, hi - lo, false), reversed)
    }

    /// Whether travelling `p1 -> p2` along this segment runs against the
    /// stored (ascending vector-section) direction. Ties are forward.
    pub fn is_reversed_between(&self, p1: Location, p2: Location) -> bool {
        self.offset_of(p1) > self.offset_of(p2)
    }

    /// The same piece of track travelled the other way. The arc keeps its
    /// geometry; only the traversal order flips.
    pub fn reversed(&self) -> TrackSegment {
        let direction = wrap_angle(self.direction_at(self.length) + std::f64::consts::PI);
        if self.curved {
            TrackSegment::new_curved(
                self.node,
                self.vector_index,
                self.end,
                direction,
                self.radius,
                -self.angle,
            )
        } else {
            TrackSegment::new_straight(
                self.node,
                self.vector_index,
                self.end,
                direction,
                self.length,
            )
        }
    }
}

impl Tiled for TrackSegment {
    fn tile_location(&self) -> Location {
        self.start
    }
}
