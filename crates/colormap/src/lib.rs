//! # ForestWatch Colormap
//!
//! Colours, layer styles and RGBA rendering for the ForestWatch map display.
//!
//! - [`Rgb`] parses and formats `#rrggbb` colours.
//! - [`LayerStyle`] carries the colour, opacity and stroke width of a layer.
//! - [`Canvas`] paints mask rasters and outlines through a [`Viewport`] and
//!   blends them with source-over compositing.
//! - [`raster_to_rgba`] renders an NDVI composite through [`NDVI_RAMP`]
//!   for export previews.
//!
//! ## Usage
//!
//! ```ignore
//! use forestwatch_colormap::{Canvas, LayerStyle, Rgb, Viewport};
//!
//! let viewport = Viewport::new(mask.bounds(), 512, 512)?;
//! let mut canvas = Canvas::new(512, 512);
//! canvas.paint_mask(&mask, &viewport, &LayerStyle::fill("#ff0000".parse()?));
//! ```

mod color;
mod render;
mod style;

pub use color::{ColorParseError, ColorStop, NDVI_RAMP, Rgb, evaluate};
pub use render::{Canvas, ColormapParams, Viewport, raster_to_rgba};
pub use style::LayerStyle;
