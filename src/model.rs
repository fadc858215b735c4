//! The track model: the immutable registry of all track nodes
//!
//! Built exactly once per loaded route and read-only afterwards. All point
//! queries narrow to a tile window first and only then run exact hit tests
//! against the small candidate set. The model also owns the central
//! stitching primitive, [`TrackModel::span_between`], which assembles the
//! chain of trimmed segments realizing a span between two points.

use crate::geometry::{self, Location, distance_sq, wrap_angle};
use crate::node::{EndNode, JunctionNode, SegmentSection, TrackNode, TrackNodeId};
use crate::segment::TrackSegment;
use crate::source::{SourceNodeKind, SourceRoute};
use crate::tile::TileIndex;
use crate::{ModelError, Result};
use geo::Point;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::f64::consts::FRAC_PI_2;

/// The immutable topological model of one rail network.
pub struct TrackModel {
    /// Dense arena keyed by track-node id; slot 0 stays empty (the source
    /// format's null sentinel never maps to a node).
    nodes: Vec<Option<TrackNode>>,
    segment_index: TileIndex<TrackSegment>,
    junction_index: TileIndex<JunctionNode>,
    end_node_index: TileIndex<EndNode>,
    section_index: TileIndex<SegmentSection>,
}

impl TrackModel {
    /// Build the model from loaded route data. One-shot; the result is
    /// immutable.
    pub fn build(route: &SourceRoute) -> Result<Self> {
        if route.nodes.is_empty() {
            return Err(ModelError::EmptyRoute);
        }
        let max_index = route.nodes.iter().map(|n| n.index).max().unwrap_or(0);
        let mut nodes: Vec<Option<TrackNode>> = vec![None; max_index as usize + 1];

        for source_node in &route.nodes {
            let id = TrackNodeId::from_raw(source_node.index)
                .ok_or(ModelError::ReservedNodeIndex(source_node.index))?;
            let node = match &source_node.kind {
                SourceNodeKind::Junction {
                    x,
                    y,
                    heading,
                    main_route,
                    branches,
                } => TrackNode::Junction(JunctionNode::new(
                    id,
                    Point::new(*x, *y),
                    wrap_angle(heading - FRAC_PI_2),
                    TrackNodeId::from_raw(*main_route),
                    branches.iter().filter_map(|&b| TrackNodeId::from_raw(b)).collect(),
                )),
                SourceNodeKind::End { x, y } => {
                    TrackNode::End(EndNode::new(id, Point::new(*x, *y)))
                }
                SourceNodeKind::Sections { vectors } => {
                    let segments = vectors
                        .iter()
                        .enumerate()
                        .map(|(vector_index, v)| {
                            let start = Point::new(v.x, v.y);
                            let direction = wrap_angle(v.heading - FRAC_PI_2);
                            match route.sections.get(&v.section) {
                                Some(def) if def.curved => TrackSegment::new_curved(
                                    id,
                                    vector_index,
                                    start,
                                    direction,
                                    def.radius,
                                    def.angle,
                                ),
                                Some(def) => TrackSegment::new_straight(
                                    id,
                                    vector_index,
                                    start,
                                    direction,
                                    def.length,
                                ),
                                None => {
                                    tracing::error!(
                                        node = id.as_u32(),
                                        vector_index,
                                        section = v.section,
                                        "track-section definition missing, leaving segment degenerate"
                                    );
                                    TrackSegment::degenerate(id, vector_index, start, direction)
                                }
                            }
                        })
                        .collect();
                    TrackNode::Section(SegmentSection::new(id, segments))
                }
            };
            let slot = &mut nodes[id.as_usize()];
            if slot.is_some() {
                return Err(ModelError::DuplicateNodeIndex(source_node.index));
            }
            *slot = Some(node);
        }

        Ok(Self::from_nodes(nodes))
    }

    /// Assemble the model from already-constructed nodes placed at their id
    /// slots. Builds the four tile indexes.
    pub fn from_nodes(nodes: Vec<Option<TrackNode>>) -> Self {
        let mut segments = Vec::new();
        let mut junctions = Vec::new();
        let mut end_nodes = Vec::new();
        let mut sections = Vec::new();
        for node in nodes.iter().flatten() {
            match node {
                TrackNode::Junction(j) => junctions.push(j.clone()),
                TrackNode::End(e) => end_nodes.push(e.clone()),
                TrackNode::Section(s) => {
                    segments.extend(s.segments().iter().cloned());
                    sections.push(s.clone());
                }
            }
        }
        tracing::debug!(
            nodes = nodes.iter().flatten().count(),
            segments = segments.len(),
            junctions = junctions.len(),
            end_nodes = end_nodes.len(),
            "track model built"
        );
        Self {
            nodes,
            segment_index: TileIndex::build(segments),
            junction_index: TileIndex::build(junctions),
            end_node_index: TileIndex::build(end_nodes),
            section_index: TileIndex::build(sections),
        }
    }

    /// The node with the given id, if any.
    pub fn node(&self, id: TrackNodeId) -> Option<&TrackNode> {
        self.nodes.get(id.as_usize()).and_then(|n| n.as_ref())
    }

    /// The segment section with the given id, if the node is one.
    pub fn section(&self, id: TrackNodeId) -> Option<&SegmentSection> {
        self.node(id).and_then(TrackNode::as_section)
    }

    /// The junction with the given id, if the node is one.
    pub fn junction(&self, id: TrackNodeId) -> Option<&JunctionNode> {
        self.node(id).and_then(TrackNode::as_junction)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TrackNode> {
        self.nodes.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_index.len()
    }

    /// The closest segment hit by `point`, if any. Ties resolve to the lower
    /// (node, vector-section) pair for determinism.
    pub fn segment_at(&self, point: Location) -> Option<&TrackSegment> {
        let mut best: Option<(&TrackSegment, f64)> = None;
        for segment in self.segment_index.query_near(point, 1) {
            if let Some(d) = segment.distance_sq(point) {
                let better = match best {
                    None => true,
                    Some((b, bd)) => match d.total_cmp(&bd) {
                        Ordering::Less => true,
                        Ordering::Equal => {
                            (segment.node(), segment.vector_index())
                                < (b.node(), b.vector_index())
                        }
                        Ordering::Greater => false,
                    },
                };
                if better {
                    best = Some((segment, d));
                }
            }
        }
        best.map(|(s, _)| s)
    }

    /// The segment of one specific track node hit by `point`.
    pub fn segment_at_node(&self, id: TrackNodeId, point: Location) -> Option<&TrackSegment> {
        self.section(id).and_then(|s| s.find_at(point))
    }

    /// Every segment hit by `point`, sorted by distance (then id) so the
    /// closest comes first. Distinct track nodes may each contribute a hit
    /// where tracks touch, e.g. around junctions.
    pub fn segments_at(&self, point: Location) -> SmallVec<[&TrackSegment; 4]> {
        let mut hits: SmallVec<[(&TrackSegment, f64); 4]> = SmallVec::new();
        for segment in self.segment_index.query_near(point, 1) {
            if let Some(d) = segment.distance_sq(point) {
                hits.push((segment, d));
            }
        }
        hits.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| (a.0.node(), a.0.vector_index()).cmp(&(b.0.node(), b.0.vector_index())))
        });
        hits.into_iter().map(|(s, _)| s).collect()
    }

    /// The junction at `point`, within the shared tolerance.
    pub fn junction_at(&self, point: Location) -> Option<&JunctionNode> {
        self.junction_index
            .query_near(point, 1)
            .find(|j| j.is_at(point))
    }

    /// The end node at `point`, within the shared tolerance.
    pub fn end_node_at(&self, point: Location) -> Option<&EndNode> {
        self.end_node_index
            .query_near(point, 1)
            .find(|e| e.is_at(point))
    }

    /// The segments connected to a junction: for each branch node, the one
    /// segment of that node whose endpoint touches the junction location.
    pub fn junction_leg_segments(&self, junction: &JunctionNode) -> SmallVec<[&TrackSegment; 4]> {
        let mut legs = SmallVec::new();
        for &branch in junction.branches() {
            let Some(section) = self.section(branch) else {
                tracing::warn!(
                    junction = junction.id().as_u32(),
                    branch = branch.as_u32(),
                    "junction branch has no segment section"
                );
                continue;
            };
            let touching = section.segments().iter().find(|s| {
                distance_sq(s.start(), junction.location()) <= geometry::ON_TRACK_TOLERANCE_SQ
                    || distance_sq(s.end(), junction.location()) <= geometry::ON_TRACK_TOLERANCE_SQ
            });
            match touching {
                Some(segment) => legs.push(segment),
                None => tracing::warn!(
                    junction = junction.id().as_u32(),
                    branch = branch.as_u32(),
                    "no segment of branch touches the junction"
                ),
            }
        }
        legs
    }

    /// Assemble the chain of trimmed segments realizing the span between two
    /// points, each with the track node it was resolved to.
    ///
    /// Returns `None` when no geometric connection can be built; the caller
    /// substitutes a straight placeholder. This is a recoverable condition,
    /// never an error.
    pub fn span_between(
        &self,
        start: Location,
        start_node: TrackNodeId,
        end: Location,
        end_node: TrackNodeId,
    ) -> Option<Vec<TrackSegment>> {
        if start_node == end_node {
            return self.span_on_node(start_node, start, end);
        }
        // The two ids disagree; try re-resolving both points, which recovers
        // rounding cases where a point sits a hair past a node boundary.
        let resolved_start = self.segment_at(start).map(TrackSegment::node);
        let resolved_end = self.segment_at(end).map(TrackSegment::node);
        if let (Some(a), Some(b)) = (resolved_start, resolved_end)
            && a == b
        {
            return self.span_on_node(a, start, end);
        }
        tracing::warn!(
            start_node = start_node.as_u32(),
            end_node = end_node.as_u32(),
            "span endpoints resolve to different track nodes"
        );
        None
    }

    /// Span construction within one track node, across one or more vector
    /// sections.
    fn span_on_node(
        &self,
        node: TrackNodeId,
        start: Location,
        end: Location,
    ) -> Option<Vec<TrackSegment>> {
        let Some(section) = self.section(node) else {
            tracing::warn!(node = node.as_u32(), "span requested on a node without segments");
            return None;
        };
        let Some(start_segment) = section.find_at(start) else {
            tracing::warn!(node = node.as_u32(), "span start point not on the node");
            return None;
        };
        let Some(end_segment) = section.find_at(end) else {
            tracing::warn!(node = node.as_u32(), "span end point not on the node");
            return None;
        };

        let segments = section.segments();
        let ia = segments
            .iter()
            .position(|s| s.vector_index() == start_segment.vector_index())?;
        let ib = segments
            .iter()
            .position(|s| s.vector_index() == end_segment.vector_index())?;

        if ia == ib {
            let (trimmed, reversed) = segments[ia].trim_between(start, end);
            return Some(vec![if reversed { trimmed.reversed() } else { trimmed }]);
        }

        // Travel order through the node follows the vector-section indices,
        // ascending or descending depending on which boundary is larger.
        let ordered: Vec<&TrackSegment> = if ia < ib {
            segments[ia..=ib].iter().collect()
        } else {
            segments[ib..=ia].iter().rev().collect()
        };

        let mut chain: Vec<TrackSegment> = Vec::with_capacity(ordered.len());

        // First piece: from the start point to the joint with the next
        // segment.
        let joint = inner_endpoint(ordered[0], ordered[1]);
        let (first, first_reversed) = ordered[0].trim_between(start, joint);
        chain.push(if first_reversed { first.reversed() } else { first });

        // Whole segments strictly between the boundaries, oriented so each
        // piece starts where the previous one ended.
        for middle in &ordered[1..ordered.len() - 1] {
            let prev_end = chain.last().map(|s| s.end()).unwrap_or(start);
            chain.push(orient_from(middle, prev_end));
        }

        // Last piece: from the joint with the previous segment to the end
        // point.
        let last = ordered[ordered.len() - 1];
        let joint = inner_endpoint(last, ordered[ordered.len() - 2]);
        let (tail, tail_reversed) = last.trim_between(joint, end);
        chain.push(if tail_reversed { tail.reversed() } else { tail });

        // A boundary point sitting exactly on a joint leaves a zero-length
        // trim behind; drop those, but never return an empty chain.
        chain.retain(|s| s.length() > 1e-9);
        if chain.is_empty() {
            let (only, _) = segments[ia].trim_between(start, end);
            chain.push(only);
        }
        Some(chain)
    }
}

/// The endpoint of `segment` closest to either endpoint of `neighbour`,
/// i.e. the shared joint between the two.
fn inner_endpoint(segment: &TrackSegment, neighbour: &TrackSegment) -> Location {
    let start_gap = distance_sq(segment.start(), neighbour.start())
        .min(distance_sq(segment.start(), neighbour.end()));
    let end_gap = distance_sq(segment.end(), neighbour.start())
        .min(distance_sq(segment.end(), neighbour.end()));
    if start_gap < end_gap {
        segment.start()
    } else {
        segment.end()
    }
}

/// A copy of `segment` oriented to begin at the end of the previous piece.
fn orient_from(segment: &TrackSegment, previous_end: Location) -> TrackSegment {
    if distance_sq(segment.start(), previous_end) <= distance_sq(segment.end(), previous_end) {
        segment.clone()
    } else {
        segment.reversed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SectionDef, SourceNode, SourceVector};
    use geo::Point;
    use std::collections::HashMap;

    const GEOM_EPS: f64 = 1e-6;

    /// A route with one end node, a 3-section straight track node
    /// (10 m, 20 m, 10 m along +x) and another end node.
    pub(crate) fn create_test_route() -> SourceRoute {
        let mut sections = HashMap::new();
        sections.insert(10, SectionDef { curved: false, length: 10.0, radius: 0.0, angle: 0.0 });
        sections.insert(20, SectionDef { curved: false, length: 20.0, radius: 0.0, angle: 0.0 });
        SourceRoute {
            name: Some("test".into()),
            sections,
            nodes: vec![
                SourceNode {
                    index: 1,
                    kind: SourceNodeKind::End { x: 0.0, y: 0.0 },
                },
                SourceNode {
                    index: 2,
                    kind: SourceNodeKind::Sections {
                        vectors: vec![
                            // heading PI/2 maps to direction 0 (+x travel).
                            SourceVector { section: 10, x: 0.0, y: 0.0, heading: std::f64::consts::FRAC_PI_2 },
                            SourceVector { section: 20, x: 10.0, y: 0.0, heading: std::f64::consts::FRAC_PI_2 },
                            SourceVector { section: 10, x: 30.0, y: 0.0, heading: std::f64::consts::FRAC_PI_2 },
                        ],
                    },
                },
                SourceNode {
                    index: 3,
                    kind: SourceNodeKind::End { x: 40.0, y: 0.0 },
                },
            ],
        }
    }

    #[test]
    fn test_build_and_counts() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        assert_eq!(model.node_count(), 3);
        assert_eq!(model.segment_count(), 3);
    }

    #[test]
    fn test_empty_route_fails() {
        let route = SourceRoute {
            name: None,
            sections: HashMap::new(),
            nodes: Vec::new(),
        };
        assert!(matches!(TrackModel::build(&route), Err(ModelError::EmptyRoute)));
    }

    #[test]
    fn test_reserved_index_fails() {
        let mut route = create_test_route();
        route.nodes[0].index = 0;
        assert!(matches!(
            TrackModel::build(&route),
            Err(ModelError::ReservedNodeIndex(0))
        ));
    }

    #[test]
    fn test_duplicate_index_fails() {
        let mut route = create_test_route();
        route.nodes[2].index = 1;
        assert!(matches!(
            TrackModel::build(&route),
            Err(ModelError::DuplicateNodeIndex(1))
        ));
    }

    #[test]
    fn test_missing_section_definition_degrades() {
        let mut route = create_test_route();
        route.sections.remove(&20);
        let model = TrackModel::build(&route).unwrap();
        // The middle segment is left degenerate, construction continues.
        let section = model.section(TrackNodeId::new(2)).unwrap();
        assert_eq!(section.segments()[1].length(), 0.0);
    }

    #[test]
    fn test_point_queries() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        let hit = model.segment_at(Point::new(15.0, 0.5)).unwrap();
        assert_eq!(hit.node(), TrackNodeId::new(2));
        assert_eq!(hit.vector_index(), 1);
        // Mid-span but past the on-track tolerance: no hit, however small
        // the offset relative to the route extent.
        assert!(model.segment_at(Point::new(15.0, 30.0)).is_none());
        assert!(model.segment_at(Point::new(15.0, 5000.0)).is_none());
        assert!(model.end_node_at(Point::new(40.0, 0.0)).is_some());
        assert!(model.junction_at(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_segment_at_joint_prefers_lower_index() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        // (10, 0) is the exact joint of vector sections 0 and 1.
        let hit = model.segment_at(Point::new(10.0, 0.0)).unwrap();
        assert_eq!(hit.vector_index(), 0);
    }

    #[test]
    fn test_span_three_sections() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        // From 5 m into section 0 to 5 m into section 2: 5 + 20 + 5 = 30 m.
        let chain = model
            .span_between(
                Point::new(5.0, 0.0),
                TrackNodeId::new(2),
                Point::new(35.0, 0.0),
                TrackNodeId::new(2),
            )
            .unwrap();
        assert_eq!(chain.len(), 3);
        let lengths: Vec<f64> = chain.iter().map(|s| s.length()).collect();
        assert!((lengths[0] - 5.0).abs() < GEOM_EPS);
        assert!((lengths[1] - 20.0).abs() < GEOM_EPS);
        assert!((lengths[2] - 5.0).abs() < GEOM_EPS);
        // Contiguity: each piece starts where the previous one ended.
        for pair in chain.windows(2) {
            assert!(geometry::distance(pair[0].end(), pair[1].start()) < GEOM_EPS);
        }
    }

    #[test]
    fn test_span_descending() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        let chain = model
            .span_between(
                Point::new(35.0, 0.0),
                TrackNodeId::new(2),
                Point::new(5.0, 0.0),
                TrackNodeId::new(2),
            )
            .unwrap();
        assert_eq!(chain.len(), 3);
        // Travel runs against the authored direction: west.
        assert!(geometry::distance(chain[0].start(), Point::new(35.0, 0.0)) < GEOM_EPS);
        assert!(geometry::distance(chain[2].end(), Point::new(5.0, 0.0)) < GEOM_EPS);
        for pair in chain.windows(2) {
            assert!(geometry::distance(pair[0].end(), pair[1].start()) < GEOM_EPS);
        }
    }

    #[test]
    fn test_span_same_segment() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        let chain = model
            .span_between(
                Point::new(12.0, 0.0),
                TrackNodeId::new(2),
                Point::new(18.0, 0.0),
                TrackNodeId::new(2),
            )
            .unwrap();
        assert_eq!(chain.len(), 1);
        assert!((chain[0].length() - 6.0).abs() < GEOM_EPS);
    }

    #[test]
    fn test_span_unresolvable() {
        let model = TrackModel::build(&create_test_route()).unwrap();
        let chain = model.span_between(
            Point::new(5.0, 0.0),
            TrackNodeId::new(2),
            Point::new(5000.0, 5000.0),
            TrackNodeId::new(3),
        );
        assert!(chain.is_none());
    }
}
