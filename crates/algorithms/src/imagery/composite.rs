//! Temporal median compositing and baseline forest masking

use crate::maybe_rayon::*;
use forestwatch_core::raster::{GridSpec, Raster};
use forestwatch_core::{Error, Result};

/// Per-pixel median over a stack of rasters on the analysis grid.
///
/// NaN values do not contribute. An even number of contributions yields
/// the mean of the two middle values; a pixel without any contribution is
/// NaN. An empty stack gives an all-NaN raster on `grid`.
pub fn median_composite(layers: &[Raster<f64>], grid: &GridSpec) -> Result<Raster<f64>> {
    let (rows, cols) = grid.shape();
    for layer in layers {
        if layer.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: layer.rows(),
                ac: layer.cols(),
            });
        }
    }

    let template = Raster::on_grid(grid, f64::NAN);
    if layers.is_empty() {
        let mut empty = template;
        empty.set_nodata(Some(f64::NAN));
        return Ok(empty);
    }

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut stack = Vec::with_capacity(layers.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                stack.clear();
                stack.extend(
                    layers
                        .iter()
                        .map(|l| unsafe { l.get_unchecked(row, col) })
                        .filter(|v| !v.is_nan()),
                );
                if let Some(m) = median(&mut stack) {
                    *out = m;
                }
            }
            row_data
        })
        .collect();

    template.derive(data, Some(f64::NAN))
}

fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
    }
}

/// Keep composite pixels whose baseline tree cover is strictly above `threshold`.
///
/// Pixels at or below the threshold, or with invalid cover, become NaN.
pub fn apply_forest_mask(
    composite: &Raster<f64>,
    tree_cover: &Raster<f64>,
    threshold: f64,
) -> Result<Raster<f64>> {
    composite.check_same_shape(tree_cover)?;

    let (rows, cols) = composite.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let cover = unsafe { tree_cover.get_unchecked(row, col) };
                if tree_cover.is_nodata(cover) {
                    continue;
                }
                if cover > threshold {
                    *out = unsafe { composite.get_unchecked(row, col) };
                }
            }
            row_data
        })
        .collect();

    composite.derive(data, Some(f64::NAN))
}

/// Boolean forest mask (1 forest, 0 not) from the tree-cover baseline
pub fn forest_mask(tree_cover: &Raster<f64>, threshold: f64) -> Result<Raster<u8>> {
    let data: Vec<u8> = tree_cover
        .data()
        .iter()
        .map(|&c| u8::from(!tree_cover.is_nodata(c) && c > threshold))
        .collect();
    tree_cover.derive(data, None)
}
