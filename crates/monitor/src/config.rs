//! Analysis configuration.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! ndvi_threshold = -0.1
//! ground_sampling_distance = 60.0
//!
//! [catalog]
//! platform = "landsat-9"
//! ```

use std::path::Path;

use forestwatch_algorithms::imagery::{ClassifyParams, CloudMaskParams};
use forestwatch_algorithms::statistics::AreaParams;
use forestwatch_algorithms::vector::VectorizeParams;
use forestwatch_cloud::StacSourceConfig;
use forestwatch_core::GridSpec;
use geo::{BoundingRect, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Thresholds, grid resolution and pixel budget of a deforestation check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Composite NDVI strictly below this is flagged
    pub ndvi_threshold: f64,
    /// Baseline cover (percent) strictly above this counts as forest
    pub tree_cover_threshold: f64,
    /// Analysis grid resolution in metres
    pub ground_sampling_distance: f64,
    /// Largest grid that area and vector reductions may process
    pub max_pixels: u64,
    pub cloud_shadow_bit: u8,
    pub cloud_bit: u8,
    /// Diagonal neighbours join regions when vectorizing
    pub eight_connected: bool,
    pub catalog: CatalogConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ndvi_threshold: 0.0,
            tree_cover_threshold: 30.0,
            ground_sampling_distance: 30.0,
            max_pixels: 10_000_000_000_000,
            cloud_shadow_bit: 3,
            cloud_bit: 5,
            eight_connected: true,
            catalog: CatalogConfig::default(),
        }
    }
}

/// Which STAC collection and assets supply scenes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub collection: String,
    pub platform: Option<String>,
    pub nir_asset: String,
    pub red_asset: String,
    pub qa_asset: String,
    pub max_items: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let stac = StacSourceConfig::default();
        Self {
            collection: stac.collection,
            platform: stac.platform,
            nir_asset: stac.nir_asset,
            red_asset: stac.red_asset,
            qa_asset: stac.qa_asset,
            max_items: stac.max_items,
        }
    }
}

impl From<&CatalogConfig> for StacSourceConfig {
    fn from(c: &CatalogConfig) -> Self {
        Self {
            collection: c.collection.clone(),
            platform: c.platform.clone(),
            nir_asset: c.nir_asset.clone(),
            red_asset: c.red_asset.clone(),
            qa_asset: c.qa_asset.clone(),
            max_items: c.max_items,
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate TOML; missing fields keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(MonitorError::Config(msg));

        if !self.ndvi_threshold.is_finite() {
            return fail(format!("ndvi_threshold must be finite, got {}", self.ndvi_threshold));
        }
        if !self.tree_cover_threshold.is_finite() {
            return fail(format!(
                "tree_cover_threshold must be finite, got {}",
                self.tree_cover_threshold
            ));
        }
        if !(self.ground_sampling_distance.is_finite() && self.ground_sampling_distance > 0.0) {
            return fail(format!(
                "ground_sampling_distance must be positive, got {}",
                self.ground_sampling_distance
            ));
        }
        if self.max_pixels == 0 {
            return fail("max_pixels must be positive".into());
        }
        self.cloud_mask_params()
            .validate()
            .or_else(|e| fail(e.to_string()))?;
        if self.catalog.max_items == 0 {
            return fail("catalog.max_items must be positive".into());
        }
        Ok(())
    }

    pub fn cloud_mask_params(&self) -> CloudMaskParams {
        CloudMaskParams {
            shadow_bit: self.cloud_shadow_bit,
            cloud_bit: self.cloud_bit,
        }
    }

    pub fn classify_params(&self) -> ClassifyParams {
        ClassifyParams {
            threshold: self.ndvi_threshold,
        }
    }

    pub fn area_params(&self) -> AreaParams {
        AreaParams {
            max_pixels: self.max_pixels,
        }
    }

    pub fn vectorize_params(&self) -> VectorizeParams {
        VectorizeParams {
            eight_connected: self.eight_connected,
            max_pixels: self.max_pixels,
        }
    }

    /// WGS84 grid covering the boundary's bounding box at the configured resolution
    pub fn analysis_grid(&self, boundary: &Polygon<f64>) -> Result<GridSpec> {
        let rect = boundary
            .bounding_rect()
            .ok_or_else(|| MonitorError::Config("boundary has no extent".into()))?;
        let (min, max) = (rect.min(), rect.max());
        Ok(GridSpec::geographic(
            (min.x, min.y, max.x, max.y),
            self.ground_sampling_distance,
        )?)
    }
}
