//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod spec;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use spec::GridSpec;
