//! [`SceneSource`] backed by a STAC catalog.
//!
//! Item search runs eagerly when `fetch` is called; the three band assets
//! of each matching item are downloaded and decoded only when the returned
//! iterator reaches that item.

use chrono::{DateTime, Utc};
use forestwatch_core::io::read_geotiff_from_buffer;
use forestwatch_core::{CRS, Raster, RasterElement, Scene, SceneIter, SceneQuery, SceneSource};
use tracing::{debug, info};

use crate::error::{CloudError, Result};
use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
use crate::stac_models::{StacItem, StacSearchParams};

/// Which collection, platform and assets make up a scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacSourceConfig {
    pub collection: String,
    /// Platform filter; `None` accepts every platform in the collection
    pub platform: Option<String>,
    pub nir_asset: String,
    pub red_asset: String,
    pub qa_asset: String,
    pub max_items: usize,
}

impl Default for StacSourceConfig {
    fn default() -> Self {
        Self {
            collection: "landsat-c2-l2".into(),
            platform: Some("landsat-8".into()),
            nir_asset: "nir08".into(),
            red_asset: "red".into(),
            qa_asset: "qa_pixel".into(),
            max_items: 100,
        }
    }
}

/// Blocking STAC scene source.
///
/// Owns a current-thread Tokio runtime; must not be used from inside
/// another async runtime.
pub struct StacSceneSource {
    rt: tokio::runtime::Runtime,
    client: StacClient,
    config: StacSourceConfig,
}

impl StacSceneSource {
    pub fn new(catalog: StacCatalog, config: StacSourceConfig) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let options = StacClientOptions {
            max_items: config.max_items,
            ..Default::default()
        };
        let client = StacClient::new(catalog, options)?;
        Ok(Self { rt, client, config })
    }

    pub fn config(&self) -> &StacSourceConfig {
        &self.config
    }

    /// Search the catalog and keep items matching platform, window and bbox.
    ///
    /// The result is sorted by acquisition time.
    pub fn search(&self, query: &SceneQuery) -> Result<Vec<(StacItem, DateTime<Utc>)>> {
        let window = query.window();
        let (min_x, min_y, max_x, max_y) = query.bbox();

        let mut params = StacSearchParams::new()
            .bbox(min_x, min_y, max_x, max_y)
            .interval(window.start, window.end)
            .collections(&[self.config.collection.as_str()])
            .limit(self.config.max_items.min(1000) as u32);
        if let Some(platform) = &self.config.platform {
            params = params.platform(platform);
        }

        let items = self.rt.block_on(self.client.search_all(&params))?;
        let found = items.len();

        let mut matching: Vec<(StacItem, DateTime<Utc>)> = items
            .into_iter()
            .filter_map(|item| {
                let acquired = item.acquired()?;
                let keep = window.contains(acquired)
                    && item.footprint().is_none_or(|fp| query.intersects(fp))
                    && self.platform_matches(&item);
                keep.then_some((item, acquired))
            })
            .collect();
        matching.sort_by_key(|(_, t)| *t);

        info!(
            catalog = ?self.client.catalog(),
            found,
            matching = matching.len(),
            "STAC scene search"
        );
        Ok(matching)
    }

    fn platform_matches(&self, item: &StacItem) -> bool {
        match (&self.config.platform, &item.properties.platform) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Download and decode the three band assets of an item.
    pub fn load_scene(&self, item: &StacItem, acquired: DateTime<Utc>) -> Result<Scene> {
        debug!(item = %item.id, "loading scene assets");
        let crs = item.epsg().map(CRS::from_epsg);

        let nir: Raster<f64> = self.load_band(item, &self.config.nir_asset, crs.as_ref())?;
        let red: Raster<f64> = self.load_band(item, &self.config.red_asset, crs.as_ref())?;
        let qa: Raster<u16> = self.load_band(item, &self.config.qa_asset, crs.as_ref())?;

        Ok(Scene::new(item.id.clone(), acquired, nir, red, qa)?)
    }

    fn load_band<T: RasterElement>(&self, item: &StacItem, key: &str, crs: Option<&CRS>) -> Result<Raster<T>> {
        let asset = item.asset(key).ok_or_else(|| CloudError::MissingAsset {
            item: item.id.clone(),
            asset: key.to_string(),
        })?;

        let bytes = self.rt.block_on(async {
            let href = self.client.sign_href(&asset.href).await?;
            self.client.download(&href).await
        })?;

        let mut raster: Raster<T> = read_geotiff_from_buffer(&bytes).map_err(|e| CloudError::Decode {
            what: format!("{}/{}", item.id, key),
            reason: e.to_string(),
        })?;
        if let Some(crs) = crs {
            raster.set_crs(Some(crs.clone()));
        }
        Ok(raster)
    }
}

impl SceneSource for StacSceneSource {
    fn name(&self) -> &str {
        "stac"
    }

    fn fetch(&self, query: &SceneQuery) -> forestwatch_core::Result<SceneIter<'_>> {
        if query.window().is_empty() {
            debug!("empty acquisition window, skipping catalog search");
            return Ok(Box::new(std::iter::empty()));
        }

        let items = self.search(query)?;
        Ok(Box::new(items.into_iter().map(move |(item, acquired)| {
            self.load_scene(&item, acquired).map_err(forestwatch_core::Error::from)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forestwatch_core::DateWindow;
    use geo::polygon;

    fn kurnool_query(window: DateWindow) -> SceneQuery {
        let boundary = polygon![(x: 77.5, y: 15.3), (x: 78.5, y: 15.3), (x: 78.5, y: 16.3), (x: 77.5, y: 16.3)];
        SceneQuery::new(boundary, window).unwrap()
    }

    #[test]
    fn test_empty_window_makes_no_request() {
        // Unroutable catalog: any request would fail
        let source = StacSceneSource::new(
            StacCatalog::Custom("http://127.0.0.1:9".into()),
            StacSourceConfig::default(),
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let mut scenes = source.fetch(&kurnool_query(DateWindow::lookback(now, 0))).unwrap();
        assert!(scenes.next().is_none());
    }

    #[test]
    fn test_platform_filter() {
        let source = StacSceneSource::new(StacCatalog::EarthSearch, StacSourceConfig::default()).unwrap();
        let item: StacItem = serde_json::from_value(serde_json::json!({
            "id": "LC09_X",
            "properties": {"platform": "landsat-9", "datetime": "2024-03-01T00:00:00Z"},
            "assets": {}
        }))
        .unwrap();
        assert!(!source.platform_matches(&item));

        let any = StacSceneSource::new(
            StacCatalog::EarthSearch,
            StacSourceConfig {
                platform: None,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(any.platform_matches(&item));
    }

    #[test]
    fn test_missing_asset_is_reported() {
        let source = StacSceneSource::new(StacCatalog::EarthSearch, StacSourceConfig::default()).unwrap();
        let item: StacItem = serde_json::from_value(serde_json::json!({
            "id": "LC08_NOASSETS",
            "properties": {"platform": "landsat-8"},
            "assets": {}
        }))
        .unwrap();
        let err = source.load_scene(&item, Utc::now()).unwrap_err();
        assert!(matches!(err, CloudError::MissingAsset { .. }));
        let core: forestwatch_core::Error = err.into();
        assert!(matches!(core, forestwatch_core::Error::SourceUnavailable(_)));
    }
}
