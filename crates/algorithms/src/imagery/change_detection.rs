//! Threshold change classification
//!
//! Turns a (forest-masked) NDVI composite into a flagged/not-flagged map.

use crate::maybe_rayon::*;
use forestwatch_core::raster::Raster;
use forestwatch_core::{Algorithm, Error, Result};

/// Pixel flagged as deforested
pub const FLAGGED: u8 = 1;
/// Valid pixel above the threshold
pub const NOT_FLAGGED: u8 = 0;
/// Invalid pixel, excluded from every reduction
pub const INVALID: u8 = 255;

/// Parameters for [`classify`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyParams {
    /// NDVI below this value is flagged. Default: 0.0
    pub threshold: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

/// Classify a composite: [`FLAGGED`] where `value < threshold` (strict),
/// [`NOT_FLAGGED`] otherwise, [`INVALID`] for NaN or nodata.
///
/// The output's nodata is [`INVALID`].
pub fn classify(composite: &Raster<f64>, params: &ClassifyParams) -> Result<Raster<u8>> {
    if params.threshold.is_nan() {
        return Err(Error::invalid("threshold", params.threshold, "must be a number"));
    }

    let (rows, cols) = composite.shape();
    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![INVALID; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = unsafe { composite.get_unchecked(row, col) };
                if composite.is_nodata(v) {
                    continue;
                }
                *out = if v < params.threshold { FLAGGED } else { NOT_FLAGGED };
            }
            row_data
        })
        .collect();

    composite.derive(data, Some(INVALID))
}

/// Threshold classification as a pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct Classify;

impl Algorithm for Classify {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ClassifyParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Classify"
    }

    fn description(&self) -> &'static str {
        "Flag pixels whose composite value falls below a threshold"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        classify(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let composite = Raster::from_vec(vec![-0.2, 0.0, 0.4, f64::NAN], 2, 2).unwrap();
        let out = classify(&composite, &ClassifyParams::default()).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), FLAGGED);
        assert_eq!(out.get(0, 1).unwrap(), NOT_FLAGGED, "0.0 is not below 0.0");
        assert_eq!(out.get(1, 0).unwrap(), NOT_FLAGGED);
        assert_eq!(out.get(1, 1).unwrap(), INVALID);
        assert_eq!(out.nodata(), Some(INVALID));
        assert_eq!(out.valid_count(), 3);
    }

    #[test]
    fn test_configured_threshold() {
        let composite = Raster::from_vec(vec![0.25, 0.35], 1, 2).unwrap();
        let out = Classify
            .execute(composite, ClassifyParams { threshold: 0.3 })
            .unwrap();
        assert_eq!(out.get(0, 0).unwrap(), FLAGGED);
        assert_eq!(out.get(0, 1).unwrap(), NOT_FLAGGED);
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let composite = Raster::filled(1, 1, 0.5);
        assert!(classify(&composite, &ClassifyParams { threshold: f64::NAN }).is_err());
    }
}
