//! Tree-cover baselines: percent canopy cover per pixel for a reference year

use std::path::Path;

use forestwatch_algorithms::imagery::resample_nearest;
use forestwatch_core::io::read_geotiff;
use forestwatch_core::{GridSpec, Raster, Result};
use tracing::debug;

/// Supplies baseline percent tree cover on an analysis grid.
///
/// Cells without baseline data are NaN.
pub trait TreeCoverSource: Send + Sync {
    fn name(&self) -> &str;

    fn tree_cover(&self, grid: &GridSpec) -> Result<Raster<f64>>;
}

/// Baseline held in a raster (e.g. a Hansen `treecover2000` tile), resampled per request
#[derive(Debug, Clone)]
pub struct RasterBaseline {
    raster: Raster<f64>,
}

impl RasterBaseline {
    pub fn new(raster: Raster<f64>) -> Self {
        Self { raster }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(read_geotiff(path)?))
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }
}

impl TreeCoverSource for RasterBaseline {
    fn name(&self) -> &str {
        "raster"
    }

    fn tree_cover(&self, grid: &GridSpec) -> Result<Raster<f64>> {
        debug!(rows = grid.rows, cols = grid.cols, "resampling tree cover baseline");
        resample_nearest(&self.raster, grid)
    }
}

/// The same cover everywhere; useful when no baseline raster is at hand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBaseline {
    pub percent: f64,
}

impl UniformBaseline {
    pub fn new(percent: f64) -> Self {
        Self { percent }
    }
}

impl TreeCoverSource for UniformBaseline {
    fn name(&self) -> &str {
        "uniform"
    }

    fn tree_cover(&self, grid: &GridSpec) -> Result<Raster<f64>> {
        let mut cover = Raster::on_grid(grid, self.percent);
        cover.set_nodata(Some(f64::NAN));
        Ok(cover)
    }
}
