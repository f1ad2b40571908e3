//! QA-bitmask cloud and shadow masking

use crate::maybe_rayon::*;
use forestwatch_core::{Algorithm, Error, Result, Scene};

/// Bit positions in the scene's QA band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudMaskParams {
    /// Cloud shadow flag (Landsat Collection 2 `QA_PIXEL` bit 3)
    pub shadow_bit: u8,
    /// Cloud flag (Landsat Collection 2 `QA_PIXEL` bit 5)
    pub cloud_bit: u8,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            shadow_bit: 3,
            cloud_bit: 5,
        }
    }
}

impl CloudMaskParams {
    pub fn validate(&self) -> Result<()> {
        for (name, bit) in [("shadow_bit", self.shadow_bit), ("cloud_bit", self.cloud_bit)] {
            if bit >= 16 {
                return Err(Error::invalid(name, bit, "QA band is 16 bits wide"));
            }
        }
        Ok(())
    }

    /// Whether a QA word marks a clear pixel
    pub fn is_clear(&self, qa: u16) -> bool {
        let flags = (1u16 << self.shadow_bit) | (1u16 << self.cloud_bit);
        qa & flags == 0
    }
}

/// Mask cloudy and shadowed pixels of a scene.
///
/// A pixel stays valid only when both the shadow and the cloud bit of its
/// QA word are clear. Pixels with missing QA (the QA band's nodata) are
/// treated as invalid. Invalid pixels become NaN in both NIR and Red.
pub fn mask_clouds(scene: &Scene, params: &CloudMaskParams) -> Result<Scene> {
    params.validate()?;
    scene.nir.check_same_shape(&scene.qa)?;
    scene.red.check_same_shape(&scene.qa)?;

    let (rows, cols) = scene.qa.shape();
    let qa_nodata = scene.qa.nodata();

    let (nir_data, red_data): (Vec<f64>, Vec<f64>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut pairs = Vec::with_capacity(cols);
            for col in 0..cols {
                let qa = unsafe { scene.qa.get_unchecked(row, col) };
                let clear = qa_nodata != Some(qa) && params.is_clear(qa);
                if clear {
                    let n = unsafe { scene.nir.get_unchecked(row, col) };
                    let r = unsafe { scene.red.get_unchecked(row, col) };
                    pairs.push((n, r));
                } else {
                    pairs.push((f64::NAN, f64::NAN));
                }
            }
            pairs
        })
        .unzip();

    let nir = scene.nir.derive(nir_data, Some(f64::NAN))?;
    let red = scene.red.derive(red_data, Some(f64::NAN))?;
    scene.with_bands(nir, red)
}

/// Cloud and shadow masking as a pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudMask;

impl Algorithm for CloudMask {
    type Input = Scene;
    type Output = Scene;
    type Params = CloudMaskParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CloudMask"
    }

    fn description(&self) -> &'static str {
        "Invalidate pixels whose QA word flags cloud or cloud shadow"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        mask_clouds(&input, &params)
    }
}
