//! Rasterising map layers into RGBA buffers.

use forestwatch_core::raster::{Raster, RasterElement};
use forestwatch_core::{Error, Result};

use crate::color::{ColorStop, NDVI_RAMP, Rgb, evaluate};
use crate::style::LayerStyle;

/// Maps a map-coordinate rectangle onto a `width` x `height` pixel canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    width: usize,
    height: usize,
}

impl Viewport {
    /// `bounds` is `(min_x, min_y, max_x, max_y)`; the image is north-up.
    pub fn new(bounds: (f64, f64, f64, f64), width: usize, height: usize) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        if !(min_x < max_x && min_y < max_y) {
            return Err(Error::invalid(
                "bounds",
                format!("{:?}", bounds),
                "extent must have positive width and height",
            ));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            width,
            height,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Fractional canvas position of a map coordinate
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.min_x) / (self.max_x - self.min_x) * self.width as f64,
            (self.max_y - y) / (self.max_y - self.min_y) * self.height as f64,
        )
    }

    /// Map coordinate of a canvas pixel centre
    pub fn to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) / self.width as f64 * (self.max_x - self.min_x),
            self.max_y - (row as f64 + 0.5) / self.height as f64 * (self.max_y - self.min_y),
        )
    }
}

/// Row-major RGBA8 image that layers are blended onto, starting transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// RGBA value at `(col, row)`, `None` outside the canvas
    pub fn pixel(&self, col: usize, row: usize) -> Option<[u8; 4]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let i = (row * self.width + col) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }

    /// Source-over blend of `color` at `alpha` onto one pixel.
    fn blend(&mut self, col: usize, row: usize, color: Rgb, alpha: u8) {
        if alpha == 0 {
            return;
        }
        let i = (row * self.width + col) * 4;
        let dst = &mut self.rgba[i..i + 4];

        let sa = alpha as f64 / 255.0;
        let da = dst[3] as f64 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        for (d, s) in dst.iter_mut().zip([color.r, color.g, color.b]) {
            *d = ((s as f64 * sa + *d as f64 * da * (1.0 - sa)) / out_a).round() as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }

    /// Fill every canvas pixel whose centre falls on a mask cell equal to 1.
    ///
    /// The mask must share the viewport's coordinate system.
    pub fn paint_mask(&mut self, mask: &Raster<u8>, viewport: &Viewport, style: &LayerStyle) {
        let (rows, cols) = mask.shape();
        let transform = *mask.transform();
        let alpha = style.alpha();

        for row in 0..self.height.min(viewport.height) {
            for col in 0..self.width.min(viewport.width) {
                let (x, y) = viewport.to_geo(col, row);
                let Some((mc, mr)) = transform.pixel_at(x, y, cols, rows) else {
                    continue;
                };
                if unsafe { mask.get_unchecked(mr, mc) } == 1 {
                    self.blend(col, row, style.color, alpha);
                }
            }
        }
    }

    /// Stroke a closed ring of map coordinates.
    ///
    /// Coverage is collected first so overlapping segments are blended once.
    pub fn stroke_ring(&mut self, ring: &[(f64, f64)], viewport: &Viewport, style: &LayerStyle) {
        if ring.len() < 2 {
            return;
        }
        let radius = (style.stroke_width / 2.0).max(0.5);
        let mut covered = vec![false; self.width * self.height];

        let points: Vec<(f64, f64)> = ring.iter().map(|&(x, y)| viewport.to_pixel(x, y)).collect();
        for seg in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (seg[0], seg[1]);
            let length = (x1 - x0).hypot(y1 - y0);
            let steps = (length * 2.0).ceil().max(1.0) as usize;
            for s in 0..=steps {
                let t = s as f64 / steps as f64;
                self.stamp(&mut covered, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, radius);
            }
        }

        let alpha = style.alpha();
        for (i, _) in covered.iter().enumerate().filter(|(_, c)| **c) {
            self.blend(i % self.width, i / self.width, style.color, alpha);
        }
    }

    /// Mark canvas pixels whose centre lies within `radius` of `(x, y)`.
    fn stamp(&self, covered: &mut [bool], x: f64, y: f64, radius: f64) {
        let min_c = (x - radius).floor().max(0.0) as usize;
        let min_r = (y - radius).floor().max(0.0) as usize;
        let max_c = ((x + radius).ceil().max(0.0) as usize).min(self.width);
        let max_r = ((y + radius).ceil().max(0.0) as usize).min(self.height);

        for r in min_r..max_r {
            for c in min_c..max_c {
                let (cx, cy) = (c as f64 + 0.5, r as f64 + 0.5);
                if (cx - x).hypot(cy - y) <= radius {
                    covered[r * self.width + c] = true;
                }
            }
        }
    }
}

/// Value range and ramp for rendering a continuous raster.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    pub stops: &'static [ColorStop],
    /// Values at or below map to the start of the ramp
    pub min: f64,
    /// Values at or above map to the end of the ramp
    pub max: f64,
    /// Color for nodata pixels (RGBA). Default: fully transparent.
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    pub fn with_range(stops: &'static [ColorStop], min: f64, max: f64) -> Self {
        Self {
            stops,
            min,
            max,
            nodata_color: [0, 0, 0, 0],
        }
    }

    /// NDVI ramp over the full index range [-1, 1]
    pub fn ndvi() -> Self {
        Self::with_range(NDVI_RAMP, -1.0, 1.0)
    }
}

/// Convert a raster to a row-major RGBA buffer of length `rows * cols * 4`.
///
/// Nodata and non-finite pixels are rendered with `params.nodata_color`.
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let range = params.max - params.min;
    let inv_range = if range.abs() > f64::EPSILON { 1.0 / range } else { 1.0 };

    let mut rgba = Vec::with_capacity(raster.len() * 4);
    for &val in raster.data().iter() {
        let value = if raster.is_nodata(val) { None } else { val.to_f64().filter(|v| v.is_finite()) };
        match value {
            Some(v) => {
                let Rgb { r, g, b } = evaluate(params.stops, (v - params.min) * inv_range);
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
            None => rgba.extend_from_slice(&params.nodata_color),
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use forestwatch_core::GeoTransform;

    fn unit_viewport(size: usize) -> Viewport {
        Viewport::new((0.0, 0.0, 1.0, 1.0), size, size).unwrap()
    }

    #[test]
    fn test_viewport_maps_corners() {
        let vp = Viewport::new((10.0, 20.0, 14.0, 22.0), 4, 2).unwrap();
        assert_eq!(vp.to_pixel(10.0, 22.0), (0.0, 0.0));
        assert_eq!(vp.to_pixel(14.0, 20.0), (4.0, 2.0));
        let (x, y) = vp.to_geo(0, 0);
        assert_relative_eq!(x, 10.5);
        assert_relative_eq!(y, 21.5);
    }

    #[test]
    fn test_viewport_rejects_degenerate_extent() {
        assert!(Viewport::new((0.0, 0.0, 0.0, 1.0), 4, 4).is_err());
        assert!(Viewport::new((0.0, 0.0, 1.0, 1.0), 0, 4).is_err());
    }

    #[test]
    fn test_paint_mask_fills_only_ones() {
        let mut mask = Raster::from_vec(vec![1u8, 0, 255, 1], 2, 2).unwrap();
        mask.set_transform(GeoTransform::new(0.0, 1.0, 0.5, -0.5));
        mask.set_nodata(Some(255));

        let mut canvas = Canvas::new(2, 2);
        canvas.paint_mask(&mask, &unit_viewport(2), &LayerStyle::fill(Rgb::new(255, 0, 0)));

        assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(1, 0), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_translucent_layers_blend_source_over() {
        let mut mask = Raster::filled(1, 1, 1u8);
        mask.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        let vp = unit_viewport(1);
        let mut canvas = Canvas::new(1, 1);

        let grey = LayerStyle::fill(Rgb::new(211, 211, 211)).with_opacity(0.5);
        canvas.paint_mask(&mask, &vp, &grey);
        assert_eq!(canvas.pixel(0, 0), Some([211, 211, 211, 128]));

        canvas.paint_mask(&mask, &vp, &LayerStyle::fill(Rgb::new(255, 0, 0)));
        assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_half_red_over_opaque_white() {
        let mut canvas = Canvas::new(1, 1);
        canvas.blend(0, 0, Rgb::WHITE, 255);
        canvas.blend(0, 0, Rgb::new(255, 0, 0), 128);
        let [r, g, b, a] = canvas.pixel(0, 0).unwrap();
        assert_eq!((r, a), (255, 255));
        assert!((g as i32 - 127).abs() <= 1 && g == b);
    }

    #[test]
    fn test_stroke_ring_draws_border_not_interior() {
        let vp = unit_viewport(10);
        let ring = [(0.05, 0.05), (0.95, 0.05), (0.95, 0.95), (0.05, 0.95), (0.05, 0.05)];
        let mut canvas = Canvas::new(10, 10);
        canvas.stroke_ring(&ring, &vp, &LayerStyle::outline(Rgb::new(47, 47, 47), 1.0));

        assert_eq!(canvas.pixel(0, 0), Some([47, 47, 47, 255]));
        assert_eq!(canvas.pixel(9, 5), Some([47, 47, 47, 255]));
        assert_eq!(canvas.pixel(5, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_translucent_stroke_blends_once_at_corners() {
        let vp = unit_viewport(10);
        let ring = [(0.05, 0.05), (0.95, 0.05), (0.95, 0.95), (0.05, 0.95), (0.05, 0.05)];
        let mut canvas = Canvas::new(10, 10);
        let style = LayerStyle::outline(Rgb::BLACK, 2.0).with_opacity(0.5);
        canvas.stroke_ring(&ring, &vp, &style);

        assert_eq!(canvas.pixel(0, 9).map(|p| p[3]), Some(128));
        assert_eq!(canvas.pixel(4, 9).map(|p| p[3]), Some(128));
    }

    #[test]
    fn test_ndvi_composite_to_rgba() {
        let mut r = Raster::<f64>::new(2, 2);
        r.set(0, 0, -1.0).unwrap();
        r.set(0, 1, 0.0).unwrap();
        r.set(1, 0, 1.0).unwrap();
        r.set(1, 1, f64::NAN).unwrap();
        r.set_nodata(Some(f64::NAN));

        let rgba = raster_to_rgba(&r, &ColormapParams::ndvi());
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[120, 70, 20, 255]);
        assert_eq!(&rgba[4..8], &[240, 230, 100, 255]);
        assert_eq!(&rgba[8..12], &[10, 100, 20, 255]);
        assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
    }
}
