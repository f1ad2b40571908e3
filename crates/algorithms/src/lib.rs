//! # ForestWatch Algorithms
//!
//! The processing stages of a deforestation check, each a pure function
//! over immutable rasters:
//!
//! - **imagery**: QA cloud/shadow masking, NDVI, resampling onto the
//!   analysis grid, median compositing, baseline forest mask, boundary
//!   clipping and threshold classification
//! - **statistics**: ground area of flagged pixels
//! - **vector**: polygons of contiguous flagged regions, spherical area

mod maybe_rayon;

pub mod imagery;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        apply_forest_mask, boundary_mask, classify, clip_to_boundary, compute_index,
        forest_mask, mask_clouds, median_composite, ndvi, resample_nearest, resample_scene, Classify,
        ClassifyParams, CloudMask, CloudMaskParams, Ndvi,
    };
    pub use crate::statistics::{total_area, AreaParams, AreaSummary};
    pub use crate::vector::{spherical_area, vectorize, Vectorize, VectorizeParams};
    pub use forestwatch_core::prelude::*;
}
