//! Nearest-neighbour resampling onto the analysis grid

use crate::maybe_rayon::*;
use forestwatch_core::crs::Projection;
use forestwatch_core::raster::{GridSpec, Raster, RasterElement};
use forestwatch_core::{Error, Result, Scene};

/// Resample `source` onto `target` by nearest neighbour.
///
/// Each target pixel centre is projected into the source CRS and takes the
/// value of the source pixel containing it. The target grid must be
/// geographic unless it shares the source CRS. Target pixels that fall
/// outside the source take the source nodata value (NaN for floats, the
/// type's maximum for integers), which also becomes the output nodata.
pub fn resample_nearest<T: RasterElement>(source: &Raster<T>, target: &GridSpec) -> Result<Raster<T>> {
    let source_crs = source.crs().cloned().unwrap_or_default();
    let projection = if source_crs.is_equivalent(&target.crs) {
        Projection::Geographic
    } else if target.crs.is_geographic() {
        source_crs.projection()?
    } else {
        return Err(Error::UnsupportedCrs(format!(
            "cannot resample {} onto {}",
            source_crs, target.crs
        )));
    };

    let fill = source.nodata().unwrap_or_else(T::default_nodata);
    let (rows, cols) = target.shape();
    let (src_rows, src_cols) = source.shape();
    let src_transform = *source.transform();

    let data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![fill; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let (x, y) = target.pixel_to_geo(col, row);
                let (sx, sy) = projection.forward(x, y);
                if let Some((sc, sr)) = src_transform.pixel_at(sx, sy, src_cols, src_rows) {
                    *out = unsafe { source.get_unchecked(sr, sc) };
                }
            }
            row_data
        })
        .collect();

    Raster::on_grid(target, fill).derive(data, Some(fill))
}

/// Crop and resample every band of a scene onto `target`.
///
/// QA pixels outside the scene take the QA nodata value, so cloud masking
/// treats them as invalid.
pub fn resample_scene(scene: &Scene, target: &GridSpec) -> Result<Scene> {
    Scene::new(
        scene.id.clone(),
        scene.acquired,
        resample_nearest(&scene.nir, target)?,
        resample_nearest(&scene.red, target)?,
        resample_nearest(&scene.qa, target)?,
    )
}
