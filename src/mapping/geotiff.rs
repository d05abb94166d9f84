//! GeoTIFF elevation maps
//!
//! Reads the first raster band of a TIFF file as elevations and marks cells
//! at or above sea level as blocked. The grid is anchored at the supplied
//! geographic origin with 1 m cells; full projection support lives with the
//! host node that produces these files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};

use crate::common::{PlannerError, PlannerResult};
use crate::mapping::Terrain;

/// Cells with elevation at or above this value (meters relative to sea
/// level) are not traversable
const BLOCKED_ELEVATION: f64 = 0.0;

const CELL_SIZE: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct GeoTiffMap {
    /// Row-major elevations, row 0 at the top of the raster
    elevations: Vec<f64>,
    rows: usize,
    cols: usize,
    origin_longitude: f64,
    origin_latitude: f64,
}

impl GeoTiffMap {
    pub fn from_file(path: &Path, longitude: f64, latitude: f64) -> PlannerResult<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| PlannerError::MapLoad(format!("{}: {}", path.display(), e)))?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PlannerError::MapLoad(format!("{}: {}", path.display(), e)))?;
        let image = decoder
            .read_image()
            .map_err(|e| PlannerError::MapLoad(format!("{}: {}", path.display(), e)))?;
        let samples: Vec<f64> = match image {
            DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U64(v) => v.into_iter().map(|s| s as f64).collect(),
            DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I64(v) => v.into_iter().map(|s| s as f64).collect(),
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F64(v) => v,
            _ => {
                return Err(PlannerError::MapLoad(format!(
                    "{}: unsupported sample format",
                    path.display()
                )))
            }
        };
        let (rows, cols) = (height as usize, width as usize);
        if rows == 0 || cols == 0 || samples.len() < rows * cols {
            return Err(PlannerError::MapLoad(format!(
                "{}: raster is {}x{} but has {} samples",
                path.display(),
                cols,
                rows,
                samples.len()
            )));
        }
        // keep the first band when the file carries several samples per pixel
        let stride = samples.len() / (rows * cols);
        let elevations = if stride > 1 {
            samples.into_iter().step_by(stride).collect()
        } else {
            samples
        };
        Ok(Self {
            elevations,
            rows,
            cols,
            origin_longitude: longitude,
            origin_latitude: latitude,
        })
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_longitude, self.origin_latitude)
    }

    pub fn extent(&self) -> (f64, f64) {
        (self.cols as f64 * CELL_SIZE, self.rows as f64 * CELL_SIZE)
    }

    pub fn query(&self, x: f64, y: f64) -> Terrain {
        if x < 0.0 || y < 0.0 {
            return Terrain::Free;
        }
        let col = (x / CELL_SIZE).floor() as usize;
        let row_from_bottom = (y / CELL_SIZE).floor() as usize;
        if col >= self.cols || row_from_bottom >= self.rows {
            return Terrain::Free;
        }
        let row = self.rows - 1 - row_from_bottom;
        if self.elevations[row * self.cols + col] >= BLOCKED_ELEVATION {
            Terrain::Blocked
        } else {
            Terrain::Free
        }
    }
}
