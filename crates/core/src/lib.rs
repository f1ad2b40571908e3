//! # ForestWatch Core
//!
//! Core types, traits and I/O for the ForestWatch deforestation monitor.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced raster grid
//! - `GridSpec`: the analysis grid a pipeline run resamples onto
//! - `GeoTransform` and `CRS` (WGS84 and UTM forward projection)
//! - `Scene` and the `SceneSource` trait implemented by imagery catalogs
//! - Vector features with GeoJSON export
//! - Native GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod scene;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, GridSpec, Raster, RasterElement};
pub use scene::{DateWindow, Scene, SceneIter, SceneQuery, SceneSource, validate_boundary};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridSpec, Raster, RasterElement};
    pub use crate::scene::{DateWindow, Scene, SceneQuery, SceneSource};
    pub use crate::Algorithm;
}

/// Core trait for the processing stages of a monitoring run.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
