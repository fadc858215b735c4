//! Raw route and path definitions as supplied by external loaders
//!
//! These are plain serde structs mirroring what a route database and a path
//! file provide: per track node its ordered vector sections (world location,
//! heading, section-definition reference) and junction/end data, plus the
//! track-section catalog; per path node a location, a type tag and successor
//! indices. The track model and train path are built from these and never
//! reference them again afterwards.
//!
//! Headings in the source data are offset a quarter turn from the travel
//! direction; the model build normalizes them via `heading - PI/2`.

use crate::path::PathNodeKind;
use crate::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One entry of the track-section definition catalog.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SectionDef {
    #[serde(default)]
    pub curved: bool,
    /// Length in metres; for curved sections this is derived from radius and
    /// angle when absent.
    #[serde(default)]
    pub length: f64,
    /// Curve radius in metres; unused for straight sections.
    #[serde(default)]
    pub radius: f64,
    /// Signed arc angle in radians; positive turns counter-clockwise.
    #[serde(default)]
    pub angle: f64,
}

/// One authored vector section of a track node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SourceVector {
    /// Reference into the section-definition catalog.
    pub section: u32,
    pub x: f64,
    pub y: f64,
    /// Source-format heading at the section start, radians.
    pub heading: f64,
}

/// Kind-specific payload of a source track node.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceNodeKind {
    Junction {
        x: f64,
        y: f64,
        /// Facing direction of the inbound leg, source-format heading.
        heading: f64,
        /// Raw index of the node reached via the aligned exit; 0 = none.
        main_route: u32,
        /// Raw indices of all connected track nodes, one per leg.
        branches: Vec<u32>,
    },
    End {
        x: f64,
        y: f64,
    },
    Sections {
        vectors: Vec<SourceVector>,
    },
}

/// One track node as delivered by the route-database loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceNode {
    /// Stable track-node index; 0 is the source format's null sentinel and
    /// must not be used for a real node.
    pub index: u32,
    #[serde(flatten)]
    pub kind: SourceNodeKind,
}

/// A complete route as delivered by the route-database loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceRoute {
    #[serde(default)]
    pub name: Option<String>,
    /// Track-section definition catalog, keyed by section id.
    pub sections: HashMap<u32, SectionDef>,
    pub nodes: Vec<SourceNode>,
}

impl SourceRoute {
    /// Load a route definition from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(ModelError::Io)?;
        let route = serde_json::from_reader(BufReader::new(file))?;
        Ok(route)
    }
}

/// One waypoint of a path definition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SourcePathNode {
    pub x: f64,
    pub y: f64,
    pub kind: PathNodeKind,
    /// Whether the definition claims this waypoint sits on a junction.
    #[serde(default)]
    pub junction: bool,
    /// Index of the next point on the main path; -1 = none.
    #[serde(default = "none_link")]
    pub next_main: i32,
    /// Index of the next point on the siding/passing path; -1 = none.
    #[serde(default = "none_link")]
    pub next_siding: i32,
}

fn none_link() -> i32 {
    -1
}

/// An ordered path definition as delivered by the path-file loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcePath {
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<SourcePathNode>,
}

impl SourcePath {
    /// Load a path definition from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(ModelError::Io)?;
        let path = serde_json::from_reader(BufReader::new(file))?;
        Ok(path)
    }

    /// Translate a raw successor link, validating the index range.
    ///
    /// Out-of-range links are malformed input and fail hard, unlike the soft
    /// validity conditions discovered during reconstruction.
    pub fn link(&self, from: usize, raw: i32) -> Result<Option<usize>> {
        if raw < 0 {
            return Ok(None);
        }
        let index = raw as usize;
        if index >= self.nodes.len() {
            return Err(ModelError::InvalidSuccessor {
                point: from,
                target: raw,
            });
        }
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_json_roundtrip() {
        let json = r#"{
            "sections": { "1": { "length": 50.0 },
                          "2": { "curved": true, "radius": 500.0, "angle": 0.1 } },
            "nodes": [
                { "index": 1, "kind": "end", "x": 0.0, "y": 0.0 },
                { "index": 2, "kind": "sections", "vectors": [
                    { "section": 1, "x": 0.0, "y": 0.0, "heading": 1.5707963 }
                ] },
                { "index": 3, "kind": "junction", "x": 50.0, "y": 0.0,
                  "heading": 1.5707963, "main_route": 2, "branches": [2] }
            ]
        }"#;
        let route: SourceRoute = serde_json::from_str(json).unwrap();
        assert_eq!(route.nodes.len(), 3);
        assert!(route.sections[&2].curved);
        match &route.nodes[2].kind {
            SourceNodeKind::Junction { main_route, .. } => assert_eq!(*main_route, 2),
            other => panic!("expected junction, got {other:?}"),
        }
    }

    #[test]
    fn test_path_link_validation() {
        let path = SourcePath {
            name: None,
            nodes: vec![
                SourcePathNode {
                    x: 0.0,
                    y: 0.0,
                    kind: PathNodeKind::Start,
                    junction: false,
                    next_main: 1,
                    next_siding: -1,
                },
                SourcePathNode {
                    x: 10.0,
                    y: 0.0,
                    kind: PathNodeKind::End,
                    junction: false,
                    next_main: -1,
                    next_siding: -1,
                },
            ],
        };
        assert_eq!(path.link(0, 1).unwrap(), Some(1));
        assert_eq!(path.link(1, -1).unwrap(), None);
        assert!(path.link(0, 5).is_err());
    }
}
