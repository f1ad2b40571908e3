//! Analysis grid definition

use crate::crs::{CRS, METERS_PER_DEGREE};
use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Shape, georeferencing and CRS of a grid that rasters are resampled onto.
///
/// A monitoring run builds one `GridSpec` covering the district's bounding
/// box; every scene band, the tree-cover baseline and all derived rasters
/// share it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub crs: CRS,
}

impl GridSpec {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize, crs: CRS) -> Self {
        Self { transform, rows, cols, crs }
    }

    /// North-up grid covering `(min_x, min_y, max_x, max_y)` with square cells.
    ///
    /// The grid is anchored at the upper-left corner and extended by whole
    /// cells so it always covers the full extent.
    pub fn covering(bounds: (f64, f64, f64, f64), cell_size: f64, crs: CRS) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::invalid("cell_size", cell_size, "must be a positive number"));
        }
        if !(min_x < max_x && min_y < max_y) {
            return Err(Error::invalid(
                "bounds",
                format!("{:?}", bounds),
                "extent must have positive width and height",
            ));
        }

        // Tolerance keeps exact multiples from growing an extra column.
        let cols = (((max_x - min_x) / cell_size) - 1e-9).ceil().max(1.0) as usize;
        let rows = (((max_y - min_y) / cell_size) - 1e-9).ceil().max(1.0) as usize;

        Ok(Self {
            transform: GeoTransform::new(min_x, max_y, cell_size, -cell_size),
            rows,
            cols,
            crs,
        })
    }

    /// WGS84 grid covering `bounds` (degrees) at a ground sampling distance in metres.
    pub fn geographic(bounds: (f64, f64, f64, f64), ground_sampling_distance: f64) -> Result<Self> {
        if !(ground_sampling_distance.is_finite() && ground_sampling_distance > 0.0) {
            return Err(Error::invalid(
                "ground_sampling_distance",
                ground_sampling_distance,
                "must be a positive number of metres",
            ));
        }
        Self::covering(bounds, ground_sampling_distance / METERS_PER_DEGREE, CRS::wgs84())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells, saturating instead of overflowing
    pub fn pixel_count(&self) -> u64 {
        (self.rows as u64).saturating_mul(self.cols as u64)
    }

    /// Map coordinates of a cell center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }
}
