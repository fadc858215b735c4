//! railtopo - Immutable Rail Track Topology and Train Path Reconstruction
//!
//! This library models a rail network as an immutable topological graph built
//! once from static route data, and reconstructs a train's intended path
//! across that graph from a sequence of loosely-specified waypoints.
//!
//! # Architecture
//!
//! - **[`TrackModel`]**: the top-level immutable registry of track nodes with
//!   tile-indexed spatial queries
//! - **[`TrackSegment`]**: one straight or circular-arc piece of track with
//!   exact geometry and hit testing
//! - **[`TileIndex`]**: coarse grid bucketing for fast nearest-element
//!   queries
//! - **[`TrainPath`]**: the reconstructed chain of track sections realizing
//!   a path definition, tolerant of imprecise or broken waypoints
//!
//! Data flows one way: raw route data ([`SourceRoute`]) is built into a
//! [`TrackModel`] once; path definitions ([`SourcePath`]) are reconstructed
//! against it; consumers only read the results. The frozen model performs no
//! interior mutation, so concurrent reads are safe once construction
//! completes.

pub mod geometry;
pub mod model;
pub mod node;
pub mod path;
pub mod segment;
pub mod source;
pub mod tile;

pub use geometry::{Location, SpanVector};
pub use model::TrackModel;
pub use node::{EndNode, JunctionNode, SegmentSection, TrackNode, TrackNodeId};
pub use path::{
    DisplayPoint, PathNodeKind, PathSection, SectionKind, TrainPath, TrainPathPoint, Validity,
};
pub use segment::TrackSegment;
pub use source::{SourcePath, SourceRoute};
pub use tile::{Tile, TileIndex};

/// Errors for malformed source data and contract violations.
///
/// Recoverable domain conditions (a waypoint off track, an ambiguous
/// junction branch) never surface here; they flow through
/// [`Validity`] flags on the affected path points instead.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("route has no track nodes")]
    EmptyRoute,

    #[error("path has no waypoints")]
    EmptyPath,

    #[error("track node index {0} is reserved")]
    ReservedNodeIndex(u32),

    #[error("duplicate track node index {0}")]
    DuplicateNodeIndex(u32),

    #[error("waypoint {point} links to out-of-range successor {target}")]
    InvalidSuccessor { point: usize, target: i32 },
}

pub type Result<T> = std::result::Result<T, ModelError>;
