//! Train paths: the reconstructed realization of a path definition
//!
//! A [`TrainPath`] is built once from a path definition plus the track
//! model and is immutable afterwards. It carries the ordered chain of
//! [`PathSection`]s realizing the path, the user-visible display points and
//! the overall bounding vector. Broken waypoints degrade to invalid
//! placeholder sections; they never abort the build.

mod build;
mod point;

pub use point::{PathNodeKind, SegmentRef, TrainPathPoint, Validity};

use crate::geometry::{Location, SpanVector};
use crate::model::TrackModel;
use crate::segment::TrackSegment;
use crate::source::SourcePath;
use crate::Result;

/// Which chain a path section belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    /// Part of the main path.
    Main,
    /// Part of a siding/passing path.
    Passing,
    /// No real track path could be built; rendered as a straight dashed
    /// connector between the two waypoints.
    Invalid,
}

/// One trimmed chain of segments forming part of a train path.
#[derive(Clone, Debug)]
pub struct PathSection {
    segments: Vec<TrackSegment>,
    kind: SectionKind,
    span: SpanVector,
}

impl PathSection {
    /// Wrap a chain of contiguous trimmed segments.
    pub(crate) fn from_chain(segments: Vec<TrackSegment>, kind: SectionKind) -> Self {
        let span = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => SpanVector::new(first.start(), last.end()),
            _ => SpanVector::new(Location::new(0.0, 0.0), Location::new(0.0, 0.0)),
        };
        Self {
            segments,
            kind,
            span,
        }
    }

    /// A straight-line placeholder between two waypoints that could not be
    /// connected over track.
    pub(crate) fn invalid(start: Location, end: Location) -> Self {
        Self {
            segments: Vec::new(),
            kind: SectionKind::Invalid,
            span: SpanVector::new(start, end),
        }
    }

    /// The trimmed segments, in travel order. Empty for invalid sections.
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.kind != SectionKind::Invalid
    }

    /// Start/end vector of this section; for invalid sections this is the
    /// placeholder connector.
    pub fn span(&self) -> SpanVector {
        self.span
    }

    /// Sum of the member segments' lengths; zero for invalid sections.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }
}

/// One user-visible waypoint of a reconstructed path.
#[derive(Clone, Copy, Debug)]
pub struct DisplayPoint {
    pub location: Location,
    pub kind: PathNodeKind,
    /// Exact travel heading where known from the track geometry, otherwise
    /// interpolated from the neighbouring waypoints.
    pub direction: Option<f64>,
    pub validity: Validity,
}

/// The reconstructed realization of a path definition.
pub struct TrainPath {
    name: Option<String>,
    sections: Vec<PathSection>,
    display_points: Vec<DisplayPoint>,
    waypoints: Vec<TrainPathPoint>,
    span: SpanVector,
}

impl TrainPath {
    /// Reconstruct a path over the track model. Runs to completion
    /// synchronously; broken waypoints are recovered locally via validity
    /// flags.
    pub fn build(model: &TrackModel, source: &SourcePath) -> Result<Self> {
        build::build_path(model, source)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The ordered path sections realizing the path.
    pub fn sections(&self) -> &[PathSection] {
        &self.sections
    }

    /// The user-visible waypoints, one per distinct location.
    pub fn display_points(&self) -> &[DisplayPoint] {
        &self.display_points
    }

    /// The resolved waypoint arena, one entry per path-definition node, in
    /// definition order. Useful for per-waypoint validation reports.
    pub fn waypoints(&self) -> &[TrainPathPoint] {
        &self.waypoints
    }

    /// Overall bounding vector from the first to the last display point.
    pub fn span(&self) -> SpanVector {
        self.span
    }

    pub fn midpoint(&self) -> Location {
        self.span.midpoint()
    }

    /// Whether every section is real track and every waypoint resolved
    /// cleanly.
    pub fn is_fully_valid(&self) -> bool {
        self.sections.iter().all(PathSection::is_valid)
            && self.waypoints.iter().all(|p| p.validity().is_clear())
    }
}
