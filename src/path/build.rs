//! Path reconstruction: stitching waypoints into connected track sections
//!
//! The builder walks the path-point sequence pair by pair along the main
//! chain and any siding chains, resolving each pair to a span over a shared
//! track node. Junction branching, direction reversal and broken waypoints
//! are all handled locally: a pair that cannot be connected yields an
//! invalid placeholder section and a validity flag, never a failure of the
//! whole build.

use super::point::{PathNodeKind, TrainPathPoint, Validity};
use super::{DisplayPoint, PathSection, SectionKind, TrainPath};
use crate::geometry::{self, ON_TRACK_TOLERANCE, SpanVector, heading_between};
use crate::model::TrackModel;
use crate::node::TrackNodeId;
use crate::segment::TrackSegment;
use crate::source::SourcePath;
use crate::{ModelError, Result};
use geo::Point;
use smallvec::SmallVec;

/// Reconstruct a train path from a path definition.
pub(super) fn build_path(model: &TrackModel, source: &SourcePath) -> Result<TrainPath> {
    if source.nodes.is_empty() {
        return Err(ModelError::EmptyPath);
    }

    // Step 1: resolve topology facts for every waypoint.
    let mut points: Vec<TrainPathPoint> = source
        .nodes
        .iter()
        .map(|n| TrainPathPoint::resolve(model, Point::new(n.x, n.y), n.kind, n.junction))
        .collect();

    // Step 2: link successors arena-style. Out-of-range links are malformed
    // input and fail hard.
    for i in 0..points.len() {
        points[i].next_main = source.link(i, source.nodes[i].next_main)?;
        points[i].next_siding = source.link(i, source.nodes[i].next_siding)?;
    }

    // End points have no forward successor of their own; they receive the
    // point that pointed to them, found by a reverse scan over the links.
    let mut inbound_main: Vec<Option<usize>> = vec![None; points.len()];
    for (i, point) in points.iter().enumerate() {
        if let Some(j) = point.next_main {
            inbound_main[j] = Some(i);
        }
    }
    for (j, point) in points.iter_mut().enumerate() {
        if point.kind == PathNodeKind::End && point.next_main.is_none() {
            point.next_main = inbound_main[j];
        }
    }

    let mut builder = Builder {
        model,
        points,
        sections: Vec::new(),
        start_directions: vec![None; source.nodes.len()],
        end_directions: vec![None; source.nodes.len()],
    };

    builder.walk_main();
    builder.walk_sidings();

    let display_points = builder.display_points();
    let span = match (display_points.first(), display_points.last()) {
        (Some(first), Some(last)) => SpanVector::new(first.location, last.location),
        _ => SpanVector::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0)),
    };

    Ok(TrainPath {
        name: source.name.clone(),
        sections: builder.sections,
        display_points,
        waypoints: builder.points,
        span,
    })
}

struct Builder<'a> {
    model: &'a TrackModel,
    points: Vec<TrainPathPoint>,
    sections: Vec<PathSection>,
    /// Exact travel heading at each waypoint where it starts a built span.
    start_directions: Vec<Option<f64>>,
    /// Exact travel heading at each waypoint where a built span arrives.
    end_directions: Vec<Option<f64>>,
}

impl Builder<'_> {
    /// Walk the main chain from the start point, building one section per
    /// consecutive pair.
    fn walk_main(&mut self) {
        let start = self
            .points
            .iter()
            .position(|p| p.kind == PathNodeKind::Start)
            .unwrap_or(0);
        let mut current = start;
        // A step budget guards against malformed circular links.
        for _ in 0..self.points.len() {
            if self.points[current].kind == PathNodeKind::End {
                break;
            }
            let Some(next) = self.points[current].next_main else {
                break;
            };
            self.build_pair(current, next, SectionKind::Main);
            current = next;
        }
    }

    /// Walk every siding chain. A chain starts at a point holding a siding
    /// link that no other point's siding link targets.
    fn walk_sidings(&mut self) {
        let mut is_target = vec![false; self.points.len()];
        for point in &self.points {
            if let Some(j) = point.next_siding {
                is_target[j] = true;
            }
        }
        for head in 0..self.points.len() {
            if self.points[head].next_siding.is_none() || is_target[head] {
                continue;
            }
            let mut current = head;
            for _ in 0..self.points.len() {
                let Some(next) = self.points[current].next_siding else {
                    break;
                };
                self.build_pair(current, next, SectionKind::Passing);
                current = next;
            }
        }
    }

    /// Build the section(s) connecting one consecutive waypoint pair.
    fn build_pair(&mut self, i: usize, j: usize, kind: SectionKind) {
        let usable = self.points[i].check_usable(i) && self.points[j].check_usable(j);
        if !usable {
            self.push_invalid(i, j);
            return;
        }

        let nodes_i = self.points[i].connected_nodes();
        let nodes_j = self.points[j].connected_nodes();
        let shared: SmallVec<[TrackNodeId; 4]> = nodes_i
            .iter()
            .filter(|n| nodes_j.contains(n))
            .copied()
            .collect();

        match shared.as_slice() {
            [] => self.connect_via_intermediary(i, j, kind),
            [node] => self.connect_on(*node, i, j, kind),
            _ => self.connect_ambiguous(&shared, i, j, kind),
        }
    }

    /// One shared track node: build the span directly.
    fn connect_on(&mut self, node: TrackNodeId, i: usize, j: usize, kind: SectionKind) {
        let start = self.points[i].location;
        let end = self.points[j].location;
        match self.model.span_between(start, node, end, node) {
            Some(chain) => self.push_chain(chain, kind, i, j),
            None => {
                tracing::warn!(point = i, node = node.as_u32(), "span construction failed");
                self.push_invalid(i, j);
            }
        }
    }

    /// Several shared nodes, i.e. a junction with multiple shared legs:
    /// disambiguate via the junction's main route. Without a matching main
    /// route the pair is marked invalid rather than guessed.
    fn connect_ambiguous(
        &mut self,
        shared: &[TrackNodeId],
        i: usize,
        j: usize,
        kind: SectionKind,
    ) {
        let junction_ref = self.points[i].junction.or(self.points[j].junction);
        let main_route = junction_ref
            .and_then(|id| self.model.junction(id))
            .and_then(|junction| junction.main_route());
        match main_route.filter(|m| shared.contains(m)) {
            Some(node) => self.connect_on(node, i, j, kind),
            None => {
                tracing::warn!(
                    point = i,
                    candidates = shared.len(),
                    "ambiguous junction branch, no main route among the shared legs"
                );
                self.push_invalid(i, j);
            }
        }
    }

    /// No shared track node: look for a junction on the far side of one of
    /// the start point's nodes whose legs reach the end point, and build the
    /// two half-spans through it instead of one.
    fn connect_via_intermediary(&mut self, i: usize, j: usize, kind: SectionKind) {
        let nodes_i = self.points[i].connected_nodes();
        let nodes_j = self.points[j].connected_nodes();

        for &near_node in &nodes_i {
            let Some(section) = self.model.section(near_node) else {
                continue;
            };
            let span = section.span();
            for endpoint in [span.start, span.end] {
                let Some(junction) = self.model.junction_at(endpoint) else {
                    continue;
                };
                let legs = self.model.junction_leg_segments(junction);
                let Some(far_node) = legs
                    .iter()
                    .map(|s| s.node())
                    .find(|n| nodes_j.contains(n))
                else {
                    continue;
                };
                let via = junction.location();
                let start = self.points[i].location;
                let end = self.points[j].location;
                let first = self.model.span_between(start, near_node, via, near_node);
                let second = self.model.span_between(via, far_node, end, far_node);
                if let (Some(first), Some(second)) = (first, second) {
                    self.push_chain(first, kind, i, j);
                    self.push_chain(second, kind, i, j);
                    return;
                }
            }
        }

        // Both points resolved to track, yet no junction bridges their
        // nodes: the pair is structurally unconnectable, not merely broken.
        tracing::warn!(point = i, "no connection possible between adjacent waypoints");
        self.points[i].validity.insert(Validity::INVALID);
        self.push_invalid(i, j);
    }

    /// Record a successfully built chain as one section, remembering the
    /// exact boundary headings for display-point synthesis.
    fn push_chain(&mut self, chain: Vec<TrackSegment>, kind: SectionKind, i: usize, j: usize) {
        if let Some(first) = chain.first()
            && self.start_directions[i].is_none()
        {
            self.start_directions[i] = Some(first.direction());
        }
        if let Some(last) = chain.last() {
            self.end_directions[j] = Some(last.direction_at(last.length()));
        }
        self.sections.push(PathSection::from_chain(chain, kind));
    }

    /// Record the straight placeholder for an unconnectable pair and flag
    /// the start point.
    fn push_invalid(&mut self, i: usize, j: usize) {
        self.points[i].validity.insert(Validity::NO_CONNECTION);
        self.sections.push(PathSection::invalid(
            self.points[i].location,
            self.points[j].location,
        ));
    }

    /// Emit the user-visible waypoints: one per distinct location along the
    /// main chain, with consecutive coincident points (a junction spanning
    /// several path-definition nodes) merged into one.
    fn display_points(&self) -> Vec<DisplayPoint> {
        let start = self
            .points
            .iter()
            .position(|p| p.kind == PathNodeKind::Start)
            .unwrap_or(0);
        let mut display: Vec<DisplayPoint> = Vec::new();
        let mut current = start;
        let mut previous_location: Option<Point<f64>> = None;
        for step in 0..self.points.len() {
            let point = &self.points[current];
            let coincident = previous_location
                .is_some_and(|prev| geometry::distance(prev, point.location) <= ON_TRACK_TOLERANCE);
            if coincident {
                // Merge into the previous display point, keeping its
                // location but accumulating validity.
                if let Some(last) = display.last_mut() {
                    let mut merged = last.validity;
                    merged.insert(point.validity);
                    last.validity = merged;
                }
            } else {
                // Prefer the exact heading from the section geometry over
                // an interpolated one.
                let direction = self.start_directions[current]
                    .or(self.end_directions[current])
                    .or_else(|| {
                        point
                            .next_main
                            .filter(|_| point.kind != PathNodeKind::End)
                            .map(|next| {
                                heading_between(point.location, self.points[next].location)
                            })
                    });
                display.push(DisplayPoint {
                    location: point.location,
                    kind: point.kind,
                    direction,
                    validity: point.validity,
                });
            }
            previous_location = Some(point.location);
            if point.kind == PathNodeKind::End || step + 1 == self.points.len() {
                break;
            }
            match point.next_main {
                Some(next) => current = next,
                None => break,
            }
        }
        display
    }
}
