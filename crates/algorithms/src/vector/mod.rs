//! Vector outputs of a monitoring run
//!
//! - Polygonize: contiguous flagged regions to polygon features
//! - Measurements: planar and spherical polygon area

mod measurements;
mod polygonize;

pub use measurements::{area, spherical_area, spherical_ring_area};
pub use polygonize::{label_regions, vectorize, Vectorize, VectorizeParams};
