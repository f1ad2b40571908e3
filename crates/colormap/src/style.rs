//! Layer styling

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// How a map layer is drawn.
///
/// Mask layers are filled with `color` at `opacity`; vector layers are
/// outlined with a stroke of `stroke_width` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub color: Rgb,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f64,
    pub stroke_width: f64,
}

impl LayerStyle {
    /// Opaque fill
    pub fn fill(color: Rgb) -> Self {
        Self {
            color,
            opacity: 1.0,
            stroke_width: 0.0,
        }
    }

    /// Opaque outline of the given width in pixels
    pub fn outline(color: Rgb, stroke_width: f64) -> Self {
        Self {
            color,
            opacity: 1.0,
            stroke_width: stroke_width.max(0.0),
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        self
    }

    /// Alpha byte for this style's opacity
    pub fn alpha(&self) -> u8 {
        (self.opacity.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}
