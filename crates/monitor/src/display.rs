//! Headless map display: an ordered list of styled layers.
//!
//! Layers are drawn first to last. A completed check replaces the whole
//! list; nothing is updated incrementally.

use forestwatch_colormap::{Canvas, LayerStyle, Rgb, Viewport};
use forestwatch_core::Raster;
use geo::{BoundingRect, Polygon};

use crate::error::Result;
use crate::pipeline::AnalysisOutcome;

pub const FOREST_MASK_LAYER: &str = "Forest Mask";
pub const DEFORESTATION_LAYER: &str = "Deforestation Areas";
pub const BOUNDARY_LAYER: &str = "Selected District Boundary";

/// Light grey at half opacity
pub fn forest_mask_style() -> LayerStyle {
    LayerStyle::fill(Rgb::new(0xd3, 0xd3, 0xd3)).with_opacity(0.5)
}

/// Solid red
pub fn deforestation_style() -> LayerStyle {
    LayerStyle::fill(Rgb::new(0xff, 0x00, 0x00))
}

/// Dark grey outline, 2 px
pub fn boundary_style() -> LayerStyle {
    LayerStyle::outline(Rgb::new(0x2f, 0x2f, 0x2f), 2.0)
}

#[derive(Debug, Clone)]
pub enum LayerData {
    /// Cells equal to 1 are filled
    Mask(Raster<u8>),
    /// Exterior and interior rings are stroked
    Outline(Polygon<f64>),
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub data: LayerData,
    pub style: LayerStyle,
}

impl Layer {
    pub fn mask(name: impl Into<String>, mask: Raster<u8>, style: LayerStyle) -> Self {
        Self {
            name: name.into(),
            data: LayerData::Mask(mask),
            style,
        }
    }

    pub fn outline(name: impl Into<String>, polygon: Polygon<f64>, style: LayerStyle) -> Self {
        Self {
            name: name.into(),
            data: LayerData::Outline(polygon),
            style,
        }
    }

    /// `(min_x, min_y, max_x, max_y)` of the layer's content
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        match &self.data {
            LayerData::Mask(r) => Some(r.bounds()),
            LayerData::Outline(p) => p.bounding_rect().map(|r| (r.min().x, r.min().y, r.max().x, r.max().y)),
        }
    }

    pub fn flagged_cells(&self) -> usize {
        match &self.data {
            LayerData::Mask(r) => r.data().iter().filter(|&&v| v == 1).count(),
            LayerData::Outline(_) => 0,
        }
    }
}

/// The three layers shown after a deforestation check
pub fn deforestation_layers(outcome: &AnalysisOutcome, boundary: &Polygon<f64>) -> Vec<Layer> {
    vec![
        Layer::mask(FOREST_MASK_LAYER, outcome.forest_mask.clone(), forest_mask_style()),
        Layer::mask(DEFORESTATION_LAYER, outcome.classification.clone(), deforestation_style()),
        Layer::outline(BOUNDARY_LAYER, boundary.clone(), boundary_style()),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct MapDisplay {
    layers: Vec<Layer>,
}

impl MapDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Drop every layer and show `layers` instead
    pub fn replace_all(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Union of all layer extents
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.layers
            .iter()
            .filter_map(Layer::bounds)
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
    }

    /// Composite all layers into a `width` x `height` RGBA canvas framing their union extent.
    ///
    /// An empty display renders fully transparent.
    pub fn render(&self, width: usize, height: usize) -> Result<Canvas> {
        let mut canvas = Canvas::new(width, height);
        let Some(bounds) = self.bounds() else {
            return Ok(canvas);
        };
        let viewport = Viewport::new(bounds, width, height)?;

        for layer in &self.layers {
            match &layer.data {
                LayerData::Mask(mask) => canvas.paint_mask(mask, &viewport, &layer.style),
                LayerData::Outline(polygon) => {
                    for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                        let points: Vec<(f64, f64)> = ring.coords().map(|c| (c.x, c.y)).collect();
                        canvas.stroke_ring(&points, &viewport, &layer.style);
                    }
                }
            }
        }
        Ok(canvas)
    }
}
