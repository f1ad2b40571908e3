//! Vegetation index computation
//!
//! NDVI is the only index the monitor needs; it is built on the generic
//! two-band normalized difference.

use crate::maybe_rayon::*;
use forestwatch_core::raster::Raster;
use forestwatch_core::{Algorithm, Error, Result, Scene};

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Pixels where either band is NaN or nodata, or where the two bands sum
/// to zero, are NaN in the output.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.check_same_shape(band_b)?;

    let (rows, cols) = band_a.shape();
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if is_nodata_f64(a, nodata_a) || is_nodata_f64(b, nodata_b) {
                    continue;
                }

                let sum = a + b;
                if sum == 0.0 {
                    continue;
                }

                row_data[col] = (a - b) / sum;
            }
            row_data
        })
        .collect();

    band_a.derive(data, Some(f64::NAN))
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// Healthy canopy sits well above zero; bare soil, water and cleared land
/// fall towards or below it.
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Attach NDVI to a scene, returning a new scene
pub fn compute_index(scene: &Scene) -> Result<Scene> {
    let index = ndvi(&scene.nir, &scene.red)?;
    scene.with_index(index)
}

/// NDVI as a pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct Ndvi;

impl Algorithm for Ndvi {
    type Input = Scene;
    type Output = Scene;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "NDVI"
    }

    fn description(&self) -> &'static str {
        "Attach the normalized difference of the NIR and red bands to a scene"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        compute_index(&input)
    }
}

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forestwatch_core::GeoTransform;

    fn scene_with(nir: Raster<f64>, red: Raster<f64>) -> Scene {
        let qa = Raster::filled(nir.rows(), nir.cols(), 0u16);
        Scene::new("LC08_TEST", Default::default(), nir, red, qa).unwrap()
    }

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_normalized_difference_basic() {
        let a = make_band(5, 5, 0.8);
        let b = make_band(5, 5, 0.2);

        let result = normalized_difference(&a, &b).unwrap();
        let val = result.get(2, 2).unwrap();

        // (0.8 - 0.2) / (0.8 + 0.2) = 0.6
        assert!((val - 0.6).abs() < 1e-10, "Expected 0.6, got {}", val);
    }

    #[test]
    fn test_ndvi_keeps_georeferencing() {
        let nir = make_band(3, 4, 3000.0);
        let red = make_band(3, 4, 1000.0);
        let result = ndvi(&nir, &red).unwrap();
        assert_eq!(result.shape(), (3, 4));
        assert_eq!(result.transform(), nir.transform());
        assert!((result.get(0, 0).unwrap() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_zero_sum_is_invalid_not_zero() {
        let nir = make_band(2, 2, 0.0);
        let red = make_band(2, 2, 0.0);
        let result = ndvi(&nir, &red).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_nan_input_propagates() {
        let mut nir = make_band(2, 2, 0.5);
        nir.set(0, 1, f64::NAN).unwrap();
        let red = make_band(2, 2, 0.1);
        let result = ndvi(&nir, &red).unwrap();
        assert!(result.get(0, 1).unwrap().is_nan());
        assert!(!result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_negative_ndvi_for_cleared_pixel() {
        let nir = make_band(1, 1, 0.1);
        let red = make_band(1, 1, 0.3);
        let result = ndvi(&nir, &red).unwrap();
        assert!((result.get(0, 0).unwrap() + 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(3, 3, 0.5);
        let b = make_band(3, 4, 0.5);
        assert!(ndvi(&a, &b).is_err());
    }

    #[test]
    fn test_compute_index_attaches_band() {
        let scene = scene_with(make_band(2, 2, 0.6), make_band(2, 2, 0.2));
        assert!(scene.index.is_none());
        let indexed = Ndvi.execute_default(scene).unwrap();
        let idx = indexed.index.as_ref().unwrap();
        assert!((idx.get(1, 0).unwrap() - 0.5).abs() < 1e-10);
    }
}
