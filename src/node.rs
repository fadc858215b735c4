//! Track node types: junctions, end nodes and segment sections
//!
//! Every addressable element of the rail graph is a track node keyed by a
//! stable [`TrackNodeId`]. The source format reserves raw index 0 as a null
//! sentinel; that sentinel is translated to `None` at load time and never
//! appears in the built model.

use crate::geometry::{self, Location, ON_TRACK_TOLERANCE_SQ, SpanVector, distance_sq};
use crate::segment::TrackSegment;
use crate::tile::Tiled;
use geo::{Coord, Rect};
use std::fmt;

/// Stable integer key of one track node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackNodeId(u32);

impl TrackNodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Translate a raw source-format index, where 0 means "no node".
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TrackNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// A junction: a point where one inbound leg splits into several outbound
/// legs, one of which is the aligned (main) route.
#[derive(Clone, Debug)]
pub struct JunctionNode {
    id: TrackNodeId,
    location: Location,
    /// Facing direction of the inbound leg.
    direction: f64,
    /// Track node reached via the junction's aligned/default exit.
    main_route: Option<TrackNodeId>,
    /// All track nodes connected to this junction, one per leg.
    branches: Vec<TrackNodeId>,
}

impl JunctionNode {
    pub fn new(
        id: TrackNodeId,
        location: Location,
        direction: f64,
        main_route: Option<TrackNodeId>,
        branches: Vec<TrackNodeId>,
    ) -> Self {
        Self {
            id,
            location,
            direction: geometry::wrap_angle(direction),
            main_route,
            branches,
        }
    }

    pub fn id(&self) -> TrackNodeId {
        self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn main_route(&self) -> Option<TrackNodeId> {
        self.main_route
    }

    pub fn branches(&self) -> &[TrackNodeId] {
        &self.branches
    }

    /// Whether `point` sits on this junction, within the shared tolerance.
    pub fn is_at(&self, point: Location) -> bool {
        distance_sq(self.location, point) <= ON_TRACK_TOLERANCE_SQ
    }
}

/// A terminal point of the network. No branching, no forward successor.
#[derive(Clone, Debug)]
pub struct EndNode {
    id: TrackNodeId,
    location: Location,
}

impl EndNode {
    pub fn new(id: TrackNodeId, location: Location) -> Self {
        Self { id, location }
    }

    pub fn id(&self) -> TrackNodeId {
        self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn is_at(&self, point: Location) -> bool {
        distance_sq(self.location, point) <= ON_TRACK_TOLERANCE_SQ
    }
}

/// The ordered chain of segments realizing one track node (or a trimmed span
/// of it), sorted by vector-section index.
///
/// Individual segments' own start/end may run either way relative to the
/// node's traversal order, so the overall span is derived from which
/// endpoints the neighbouring segments share rather than from the stored
/// directions.
#[derive(Clone, Debug)]
pub struct SegmentSection {
    id: TrackNodeId,
    segments: Vec<TrackSegment>,
    bounding_box: Rect<f64>,
    span: SpanVector,
}

impl SegmentSection {
    /// Assemble a section from the segments of one track node.
    ///
    /// The segments are sorted by vector-section index; the span and
    /// bounding box are computed once here.
    pub fn new(id: TrackNodeId, mut segments: Vec<TrackSegment>) -> Self {
        segments.sort_by_key(|s| s.vector_index());
        let bounding_box = Self::compute_bounding_box(&segments);
        let span = Self::compute_span(&segments);
        Self {
            id,
            segments,
            bounding_box,
            span,
        }
    }

    fn compute_bounding_box(segments: &[TrackSegment]) -> Rect<f64> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for segment in segments {
            // Endpoints plus the midpoint, which bounds arc bulge well
            // enough for coarse queries.
            for p in [
                segment.start(),
                segment.end(),
                segment.location_at(segment.length() / 2.0),
            ] {
                min_x = min_x.min(p.x());
                min_y = min_y.min(p.y());
                max_x = max_x.max(p.x());
                max_y = max_y.max(p.y());
            }
        }
        if segments.is_empty() {
            return Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 });
        }
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    fn compute_span(segments: &[TrackSegment]) -> SpanVector {
        match segments {
            [] => SpanVector::new(Location::new(0.0, 0.0), Location::new(0.0, 0.0)),
            [only] => SpanVector::new(only.start(), only.end()),
            [first, .., last] => {
                let start = Self::outer_endpoint(first, segments[1].start(), segments[1].end());
                let before_last = &segments[segments.len() - 2];
                let end = Self::outer_endpoint(last, before_last.start(), before_last.end());
                SpanVector::new(start, end)
            }
        }
    }

    /// The endpoint of `segment` that is further from both endpoints of its
    /// neighbour, i.e. the one facing away from the shared joint.
    fn outer_endpoint(
        segment: &TrackSegment,
        neighbour_start: Location,
        neighbour_end: Location,
    ) -> Location {
        let start_gap = distance_sq(segment.start(), neighbour_start)
            .min(distance_sq(segment.start(), neighbour_end));
        let end_gap = distance_sq(segment.end(), neighbour_start)
            .min(distance_sq(segment.end(), neighbour_end));
        if start_gap >= end_gap {
            segment.start()
        } else {
            segment.end()
        }
    }

    pub fn id(&self) -> TrackNodeId {
        self.id
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// The segment with the given vector-section index, if present.
    pub fn segment(&self, vector_index: usize) -> Option<&TrackSegment> {
        self.segments
            .iter()
            .find(|s| s.vector_index() == vector_index)
    }

    /// The segment of this section hit by `point`, preferring the closest
    /// match and, on ties, the lower vector-section index.
    pub fn find_at(&self, point: Location) -> Option<&TrackSegment> {
        let mut best: Option<(&TrackSegment, f64)> = None;
        for segment in &self.segments {
            if let Some(d) = segment.distance_sq(point) {
                match best {
                    Some((_, best_d)) if best_d <= d => {}
                    _ => best = Some((segment, d)),
                }
            }
        }
        best.map(|(s, _)| s)
    }

    /// Sum of the member segments' lengths.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// Representative start/end vector spanning the whole node.
    pub fn span(&self) -> SpanVector {
        self.span
    }
}

impl Tiled for SegmentSection {
    fn tile_location(&self) -> Location {
        self.span.start
    }
}

impl Tiled for JunctionNode {
    fn tile_location(&self) -> Location {
        self.location
    }
}

impl Tiled for EndNode {
    fn tile_location(&self) -> Location {
        self.location
    }
}

/// One addressable node of the rail graph.
#[derive(Clone, Debug)]
pub enum TrackNode {
    Junction(JunctionNode),
    End(EndNode),
    Section(SegmentSection),
}

impl TrackNode {
    pub fn id(&self) -> TrackNodeId {
        match self {
            TrackNode::Junction(j) => j.id(),
            TrackNode::End(e) => e.id(),
            TrackNode::Section(s) => s.id(),
        }
    }

    /// A representative location for the node.
    pub fn location(&self) -> Location {
        match self {
            TrackNode::Junction(j) => j.location(),
            TrackNode::End(e) => e.location(),
            TrackNode::Section(s) => s.span().start,
        }
    }

    pub fn as_section(&self) -> Option<&SegmentSection> {
        match self {
            TrackNode::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_junction(&self) -> Option<&JunctionNode> {
        match self {
            TrackNode::Junction(j) => Some(j),
            _ => None,
        }
    }
}
