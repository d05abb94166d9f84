//! Grid-world map format
//!
//! A plain-text raster: the first line is the cell resolution in meters,
//! each following line is one row of cells where `#` is blocked and any
//! other character is free. The first row is the top of the map (greatest
//! y); the origin cell (0, 0) is the bottom-left corner.

use std::fs;
use std::path::Path;

use crate::common::{PlannerError, PlannerResult};
use crate::mapping::Terrain;

#[derive(Debug, Clone)]
pub struct GridWorldMap {
    resolution: f64,
    /// Row-major, row 0 at the bottom
    blocked: Vec<Vec<bool>>,
    rows: usize,
    cols: usize,
}

impl GridWorldMap {
    pub fn from_file(path: &Path) -> PlannerResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> PlannerResult<Self> {
        let mut lines = contents.lines();
        let header = lines
            .next()
            .ok_or_else(|| PlannerError::MapLoad("empty grid-world file".to_string()))?;
        let resolution: f64 = header.trim().parse().map_err(|_| {
            PlannerError::MapLoad(format!("bad grid-world resolution line: {:?}", header))
        })?;
        if resolution <= 0.0 {
            return Err(PlannerError::MapLoad(format!(
                "grid-world resolution must be positive, got {}",
                resolution
            )));
        }
        // file rows run top-down; store bottom-up so row index grows with y
        let mut blocked: Vec<Vec<bool>> = lines
            .map(|line| line.chars().map(|c| c == '#').collect())
            .collect();
        blocked.reverse();
        if blocked.is_empty() {
            return Err(PlannerError::MapLoad("grid-world file has no rows".to_string()));
        }
        let rows = blocked.len();
        let cols = blocked.iter().map(Vec::len).max().unwrap_or(0);
        Ok(Self {
            resolution,
            blocked,
            rows,
            cols,
        })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn extent(&self) -> (f64, f64) {
        (self.cols as f64 * self.resolution, self.rows as f64 * self.resolution)
    }

    pub fn query(&self, x: f64, y: f64) -> Terrain {
        if x < 0.0 || y < 0.0 {
            return Terrain::Free;
        }
        let col = (x / self.resolution).floor() as usize;
        let row = (y / self.resolution).floor() as usize;
        if row >= self.rows || col >= self.cols {
            return Terrain::Free;
        }
        if self.blocked[row].get(col).copied().unwrap_or(false) {
            Terrain::Blocked
        } else {
            Terrain::Free
        }
    }
}
