//! Imagery stages of a monitoring run
//!
//! - Cloud/shadow masking from the QA bitmask
//! - NDVI on each scene
//! - Nearest-neighbour resampling onto the analysis grid
//! - Median compositing, baseline forest mask and boundary clipping
//! - Threshold change classification

mod change_detection;
mod clip;
mod cloud_mask;
mod composite;
mod indices;
mod resample;

pub use change_detection::{classify, Classify, ClassifyParams, FLAGGED, INVALID, NOT_FLAGGED};
pub use clip::{boundary_mask, clip_to_boundary};
pub use cloud_mask::{mask_clouds, CloudMask, CloudMaskParams};
pub use composite::{apply_forest_mask, forest_mask, median_composite};
pub use indices::{compute_index, ndvi, normalized_difference, Ndvi};
pub use resample::{resample_nearest, resample_scene};
