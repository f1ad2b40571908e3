//! Reductions over classification rasters
//!
//! - **area**: ground area of flagged pixels under a pixel budget

pub mod area;

pub use area::{check_pixel_budget, row_pixel_areas, total_area, AreaParams, AreaSummary};
