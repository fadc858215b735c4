//! Path points: waypoints enriched with topology facts
//!
//! Each waypoint of a path definition is resolved against the track model
//! once, on construction: junction lookup, connected segments, validity
//! flags. Successors are expressed as indices into the point arena, resolved
//! in a second pass after all points exist.

use crate::geometry::Location;
use crate::model::TrackModel;
use crate::node::TrackNodeId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// The type tag of a path-definition waypoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathNodeKind {
    Start,
    End,
    Normal,
    Junction,
    /// The train changes direction at this point.
    Reversal,
    /// Timed stop; the source format's uncouple/stop tags fold into this.
    Wait,
    SidingStart,
    SidingEnd,
}

/// Validity flags of a path point. Multiple flags may combine.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Validity(u8);

impl Validity {
    pub const CLEAR: Validity = Validity(0);
    /// The definition claimed a junction but none was found at the location.
    pub const NO_JUNCTION_NODE: Validity = Validity(1 << 0);
    /// No track segment touches the location.
    pub const NOT_ON_TRACK: Validity = Validity(1 << 1);
    /// No connection to the neighbouring waypoint could be built.
    pub const NO_CONNECTION: Validity = Validity(1 << 2);
    /// Generic invalidity recorded during reconstruction.
    pub const INVALID: Validity = Validity(1 << 3);

    pub fn is_clear(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, flag: Validity) -> bool {
        self.0 & flag.0 == flag.0 && flag.0 != 0
    }

    pub fn insert(&mut self, flag: Validity) {
        self.0 |= flag.0;
    }
}

impl fmt::Debug for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear() {
            return f.write_str("clear");
        }
        let mut first = true;
        for (flag, name) in [
            (Validity::NO_JUNCTION_NODE, "no-junction-node"),
            (Validity::NOT_ON_TRACK, "not-on-track"),
            (Validity::NO_CONNECTION, "no-connection"),
            (Validity::INVALID, "invalid"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of one track segment: its owning node and vector-section index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentRef {
    pub node: TrackNodeId,
    pub vector_index: usize,
}

/// One waypoint of a path definition, enriched with topology facts.
#[derive(Clone, Debug)]
pub struct TrainPathPoint {
    pub(crate) location: Location,
    pub(crate) kind: PathNodeKind,
    /// The junction found at this location, when the definition flags one.
    pub(crate) junction: Option<TrackNodeId>,
    /// Segments topologically connected to this location.
    pub(crate) connected: SmallVec<[SegmentRef; 4]>,
    /// Arena index of the next point on the main path.
    pub(crate) next_main: Option<usize>,
    /// Arena index of the next point on the siding/passing path.
    pub(crate) next_siding: Option<usize>,
    pub(crate) validity: Validity,
}

impl TrainPathPoint {
    /// Resolve a raw waypoint against the track model.
    ///
    /// Successor links are left unset; they are filled in a second pass once
    /// every point exists.
    pub fn resolve(
        model: &TrackModel,
        location: Location,
        kind: PathNodeKind,
        junction_flagged: bool,
    ) -> Self {
        let mut validity = Validity::CLEAR;
        let expects_junction = junction_flagged || kind == PathNodeKind::Junction;

        let junction = if expects_junction {
            let found = model.junction_at(location);
            if found.is_none() {
                validity.insert(Validity::NO_JUNCTION_NODE);
            }
            found
        } else {
            None
        };

        let mut connected: SmallVec<[SegmentRef; 4]> = SmallVec::new();
        if let Some(junction) = junction {
            for segment in model.junction_leg_segments(junction) {
                connected.push(SegmentRef {
                    node: segment.node(),
                    vector_index: segment.vector_index(),
                });
            }
        }
        if connected.is_empty() {
            for segment in model.segments_at(location) {
                let segment_ref = SegmentRef {
                    node: segment.node(),
                    vector_index: segment.vector_index(),
                };
                if !connected.contains(&segment_ref) {
                    connected.push(segment_ref);
                }
            }
        }

        // On track iff at least one connected segment exists or, when a
        // junction was expected, one was actually found.
        if connected.is_empty() && !(expects_junction && junction.is_some()) {
            validity.insert(Validity::NOT_ON_TRACK);
        }

        Self {
            location,
            kind,
            junction: junction.map(|j| j.id()),
            connected,
            next_main: None,
            next_siding: None,
            validity,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn kind(&self) -> PathNodeKind {
        self.kind
    }

    pub fn junction(&self) -> Option<TrackNodeId> {
        self.junction
    }

    pub fn connected(&self) -> &[SegmentRef] {
        &self.connected
    }

    pub fn next_main(&self) -> Option<usize> {
        self.next_main
    }

    pub fn next_siding(&self) -> Option<usize> {
        self.next_siding
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// The distinct track nodes touched by this point's connected segments.
    pub fn connected_nodes(&self) -> SmallVec<[TrackNodeId; 4]> {
        let mut nodes: SmallVec<[TrackNodeId; 4]> = SmallVec::new();
        for segment_ref in &self.connected {
            if !nodes.contains(&segment_ref.node) {
                nodes.push(segment_ref.node);
            }
        }
        nodes
    }

    /// Whether this point can take part in reconstruction despite its flags.
    ///
    /// A junction-flag mismatch alone is a soft warning; the other flags are
    /// hard failures for this point. Logs a warning either way, keyed by the
    /// waypoint index for reporting.
    pub fn check_usable(&self, index: usize) -> bool {
        if self.validity.is_clear() {
            return true;
        }
        let hard = self.validity.contains(Validity::NOT_ON_TRACK)
            || self.validity.contains(Validity::NO_CONNECTION)
            || self.validity.contains(Validity::INVALID);
        if hard {
            tracing::warn!(point = index, validity = %self.validity, "path point unusable");
            false
        } else {
            tracing::warn!(
                point = index,
                validity = %self.validity,
                "path point flagged but usable"
            );
            true
        }
    }
}
