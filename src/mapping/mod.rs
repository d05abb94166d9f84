//! Static traversability maps
//!
//! The planner queries a map per point: a cell is either blocked or free
//! with an optional traversal cost. Maps are immutable once loaded and are
//! hot-swapped into the planner configuration between iterations.

pub mod geotiff;
pub mod grid_world;

pub use geotiff::GeoTiffMap;
pub use grid_world::GridWorldMap;

use crate::common::PlannerResult;
use std::path::Path;

/// Result of a point query against a static map
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terrain {
    Free,
    Blocked,
    /// Traversable at an added cost per meter
    Cost(f64),
}

impl Terrain {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Terrain::Blocked)
    }

    pub fn cost(&self) -> f64 {
        match self {
            Terrain::Cost(c) => *c,
            _ => 0.0,
        }
    }
}

/// A loaded static map. Points outside any map's extent are free.
#[derive(Debug, Clone, Default)]
pub enum Map {
    /// No map loaded; everything is traversable
    #[default]
    Empty,
    GridWorld(GridWorldMap),
    GeoTiff(GeoTiffMap),
}

impl Map {
    pub fn query(&self, x: f64, y: f64) -> Terrain {
        match self {
            Map::Empty => Terrain::Free,
            Map::GridWorld(m) => m.query(x, y),
            Map::GeoTiff(m) => m.query(x, y),
        }
    }

    pub fn is_blocked(&self, x: f64, y: f64) -> bool {
        self.query(x, y).is_blocked()
    }
}

/// Load a map file, picking the format from the file name: names containing
/// `.map` are grid-world rasters, anything else is treated as GeoTIFF
/// anchored at the given origin.
pub fn load_map(path: &Path, longitude: f64, latitude: f64) -> PlannerResult<Map> {
    let name = path.to_string_lossy();
    if name.contains(".map") {
        Ok(Map::GridWorld(GridWorldMap::from_file(path)?))
    } else {
        Ok(Map::GeoTiff(GeoTiffMap::from_file(path, longitude, latitude)?))
    }
}
