//! Tile-based spatial index
//!
//! Elements are bucketed by the coarse grid cell (tile) containing their
//! location. Queries return every element whose tile lies within a window of
//! tiles around a centre tile, which keeps the candidate set for exact hit
//! tests small without ever consulting exact geometry here.
//!
//! The index is build-once: it is constructed from a finite collection and
//! never grows afterwards, matching the lifecycle of the track model that
//! owns it.

use crate::geometry::Location;
use std::collections::HashMap;

/// Edge length of one tile in metres.
///
/// This matches the raster of the source route data. It only affects
/// bucketing granularity, never exact geometry.
pub const TILE_SIZE: f64 = 2048.0;

/// A coarse grid cell identified by integer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    /// The tile containing a world location.
    #[inline]
    pub fn containing(location: Location) -> Self {
        Self {
            x: (location.x() / TILE_SIZE).floor() as i32,
            y: (location.y() / TILE_SIZE).floor() as i32,
        }
    }
}

/// Anything that can be bucketed by a representative location.
pub trait Tiled {
    /// The location used for tile bucketing. For extended elements any point
    /// on the element works as long as queries use a window of at least one
    /// extra tile.
    fn tile_location(&self) -> Location;
}

/// A build-once spatial index bucketing elements by tile.
#[derive(Clone, Debug)]
pub struct TileIndex<T> {
    elements: Vec<T>,
    buckets: HashMap<Tile, Vec<u32>>,
}

impl<T: Tiled> TileIndex<T> {
    /// Build the index from a finite collection of elements.
    pub fn build(elements: Vec<T>) -> Self {
        let mut buckets: HashMap<Tile, Vec<u32>> = HashMap::new();
        for (i, element) in elements.iter().enumerate() {
            let tile = Tile::containing(element.tile_location());
            buckets.entry(tile).or_default().push(i as u32);
        }
        Self { elements, buckets }
    }

    /// All elements whose tile lies within `extra` tiles of `center` in both
    /// axes (a `(2 * extra + 1)^2` tile window).
    pub fn query_window(&self, center: Tile, extra: i32) -> impl Iterator<Item = &T> {
        let extra = extra.max(0);
        (-extra..=extra)
            .flat_map(move |dy| (-extra..=extra).map(move |dx| (dx, dy)))
            .filter_map(move |(dx, dy)| {
                self.buckets.get(&Tile {
                    x: center.x + dx,
                    y: center.y + dy,
                })
            })
            .flatten()
            .map(|&i| &self.elements[i as usize])
    }

    /// All elements within `extra` tiles of the tile containing `location`.
    pub fn query_near(&self, location: Location, extra: i32) -> impl Iterator<Item = &T> {
        self.query_window(Tile::containing(location), extra)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    struct Marker {
        location: Location,
        name: &'static str,
    }

    impl Tiled for Marker {
        fn tile_location(&self) -> Location {
            self.location
        }
    }

    fn create_test_index() -> TileIndex<Marker> {
        TileIndex::build(vec![
            Marker {
                location: Point::new(10.0, 10.0),
                name: "origin",
            },
            Marker {
                location: Point::new(TILE_SIZE + 1.0, 5.0),
                name: "east",
            },
            Marker {
                location: Point::new(-1.0, -1.0),
                name: "southwest",
            },
            Marker {
                location: Point::new(10.0 * TILE_SIZE, 10.0 * TILE_SIZE),
                name: "far",
            },
        ])
    }

    #[test]
    fn test_tile_containing() {
        assert_eq!(Tile::containing(Point::new(0.0, 0.0)), Tile { x: 0, y: 0 });
        assert_eq!(
            Tile::containing(Point::new(-0.1, TILE_SIZE)),
            Tile { x: -1, y: 1 }
        );
    }

    #[test]
    fn test_window_zero_only_hits_own_tile() {
        let index = create_test_index();
        let names: Vec<_> = index
            .query_near(Point::new(5.0, 5.0), 0)
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["origin"]);
    }

    #[test]
    fn test_window_one_spans_neighbours() {
        let index = create_test_index();
        let mut names: Vec<_> = index
            .query_near(Point::new(5.0, 5.0), 1)
            .map(|m| m.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["east", "origin", "southwest"]);
    }

    #[test]
    fn test_completeness_every_element_found_at_its_own_tile() {
        let index = create_test_index();
        for element in index.iter() {
            let found = index
                .query_near(element.tile_location(), 1)
                .any(|m| std::ptr::eq(m, element));
            assert!(found, "element {} missing from its own window", element.name);
        }
    }

    #[test]
    fn test_empty_index() {
        let index: TileIndex<Marker> = TileIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.query_near(Point::new(0.0, 0.0), 3).count(), 0);
    }
}
