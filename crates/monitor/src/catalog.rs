//! Directory-backed scene catalog.
//!
//! A catalog directory holds one GeoTIFF per band and a `catalog.json`
//! index:
//!
//! ```json
//! {
//!   "scenes": [
//!     {
//!       "id": "LC08_L2SP_144048_20240310_02_T1",
//!       "datetime": "2024-03-10T05:04:18Z",
//!       "bbox": [77.32, 15.21, 79.48, 17.33],
//!       "epsg": 32644,
//!       "nir": "LC08_..._SR_B5.TIF",
//!       "red": "LC08_..._SR_B4.TIF",
//!       "qa": "LC08_..._QA_PIXEL.TIF"
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forestwatch_core::io::read_geotiff;
use forestwatch_core::{CRS, Error, Raster, RasterElement, Result, Scene, SceneIter, SceneQuery, SceneSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const INDEX_FILE: &str = "catalog.json";

/// One scene listed in `catalog.json`; band paths are relative to the catalog directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// `[min_x, min_y, max_x, max_y]` in lon/lat
    pub bbox: [f64; 4],
    /// CRS of the band files; overrides whatever the files declare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
    pub nir: String,
    pub red: String,
    pub qa: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogIndex {
    scenes: Vec<CatalogEntry>,
}

/// Scenes stored on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl LocalCatalog {
    /// Read the index of a catalog directory. Bands are not touched until fetched.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let index_path = root.join(INDEX_FILE);
        let text = std::fs::read_to_string(&index_path)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {e}", index_path.display())))?;
        let index: CatalogIndex = serde_json::from_str(&text)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {e}", index_path.display())))?;

        info!(root = %root.display(), scenes = index.scenes.len(), "opened local catalog");
        Ok(Self {
            root,
            entries: index.scenes,
        })
    }

    /// Write `catalog.json` for the given entries into `root`
    pub fn write_index(root: impl AsRef<Path>, entries: &[CatalogEntry]) -> Result<()> {
        let index = CatalogIndex {
            scenes: entries.to_vec(),
        };
        let text = serde_json::to_string_pretty(&index).map_err(|e| Error::Other(e.to_string()))?;
        std::fs::write(root.as_ref().join(INDEX_FILE), text)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    fn load_scene(&self, entry: &CatalogEntry) -> Result<Scene> {
        debug!(scene = %entry.id, "reading scene bands");
        let crs = entry.epsg.map(CRS::from_epsg);
        let nir: Raster<f64> = self.load_band(&entry.nir, crs.as_ref())?;
        let red: Raster<f64> = self.load_band(&entry.red, crs.as_ref())?;
        let qa: Raster<u16> = self.load_band(&entry.qa, crs.as_ref())?;
        Scene::new(entry.id.clone(), entry.datetime, nir, red, qa)
    }

    fn load_band<T: RasterElement>(&self, file: &str, crs: Option<&CRS>) -> Result<Raster<T>> {
        let path = self.root.join(file);
        let mut raster: Raster<T> = read_geotiff(&path).map_err(|e| match e {
            Error::Io(io) => Error::SourceUnavailable(format!("{}: {io}", path.display())),
            other => other,
        })?;
        if let Some(crs) = crs {
            raster.set_crs(Some(crs.clone()));
        }
        Ok(raster)
    }
}

impl SceneSource for LocalCatalog {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch(&self, query: &SceneQuery) -> Result<SceneIter<'_>> {
        let window = *query.window();
        let mut matching: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| window.contains(e.datetime))
            .filter(|e| query.intersects((e.bbox[0], e.bbox[1], e.bbox[2], e.bbox[3])))
            .collect();
        matching.sort_by_key(|e| e.datetime);

        debug!(catalog = self.name(), matching = matching.len(), "catalog query");
        Ok(Box::new(matching.into_iter().map(move |entry| self.load_scene(entry))))
    }
}
