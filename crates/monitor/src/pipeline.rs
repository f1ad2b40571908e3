//! The deforestation check as an explicit sequence of eager stages:
//! fetch, resample, mask, index, composite, forest mask, clip, classify,
//! area and vectorize.

use forestwatch_algorithms::imagery::{
    apply_forest_mask, classify, clip_to_boundary, compute_index, forest_mask, mask_clouds,
    median_composite, resample_scene,
};
use forestwatch_algorithms::statistics::{AreaSummary, check_pixel_budget, total_area};
use forestwatch_algorithms::vector::vectorize;
use forestwatch_core::vector::FeatureCollection;
use forestwatch_core::{DateWindow, GridSpec, Raster, SceneQuery, SceneSource};
use tracing::{debug, info, warn};

use crate::baseline::TreeCoverSource;
use crate::config::AnalysisConfig;
use crate::error::{MonitorError, Result};
use crate::registry::District;

/// Everything one deforestation check produces
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub district: String,
    pub window: DateWindow,
    pub grid: GridSpec,
    /// Scenes that contributed to the composite
    pub scene_count: usize,
    /// 1 where baseline cover exceeds the forest threshold
    pub forest_mask: Raster<u8>,
    /// Median NDVI over forest pixels inside the district, NaN elsewhere
    pub composite: Raster<f64>,
    /// 1 flagged, 0 not flagged, 255 invalid
    pub classification: Raster<u8>,
    pub area: AreaSummary,
    pub features: FeatureCollection,
}

impl AnalysisOutcome {
    pub fn has_deforestation(&self) -> bool {
        !self.features.is_empty()
    }
}

/// Run one deforestation check for `district` over `window`.
///
/// Zero matching scenes is not an error: the composite is all NaN, so
/// nothing is flagged and the area is zero.
pub fn run_analysis(
    district: &District,
    window: DateWindow,
    source: &dyn SceneSource,
    baseline: &dyn TreeCoverSource,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome> {
    config.validate()?;
    let grid = config.analysis_grid(&district.boundary)?;
    check_pixel_budget(grid.rows, grid.cols, config.max_pixels)?;
    info!(
        district = %district.name,
        rows = grid.rows,
        cols = grid.cols,
        start = %window.start,
        end = %window.end,
        "analysis grid ready"
    );

    let query = SceneQuery::new(district.boundary.clone(), window)?;
    let mask_params = config.cloud_mask_params();

    let mut layers: Vec<Raster<f64>> = Vec::new();
    for scene in source.fetch(&query)? {
        // Crop to the district grid first; full scenes never reach the f64 stages
        let scene = resample_scene(&scene?, &grid)?;
        let masked = mask_clouds(&scene, &mask_params)?;
        let Some(layer) = compute_index(&masked)?.index else {
            return Err(MonitorError::Config(format!("scene {} has no index band", scene.id)));
        };
        debug!(scene = %scene.id, valid = layer.valid_count(), "scene composited");
        layers.push(layer);
    }
    info!(source = source.name(), scenes = layers.len(), "scenes processed");
    if layers.is_empty() {
        warn!(district = %district.name, "no qualifying scenes in window");
    }

    let composite = median_composite(&layers, &grid)?;

    let tree_cover = baseline.tree_cover(&grid)?;
    let forest = forest_mask(&tree_cover, config.tree_cover_threshold)?;
    let composite = apply_forest_mask(&composite, &tree_cover, config.tree_cover_threshold)?;
    let composite = clip_to_boundary(&composite, &district.boundary)?;
    info!(baseline = baseline.name(), valid = composite.valid_count(), "forest composite ready");

    let classification = classify(&composite, &config.classify_params())?;
    let area = total_area(&classification, &config.area_params())?;
    let features = vectorize(&classification, &config.vectorize_params())?;
    info!(
        flagged = area.flagged_pixels,
        kha = area.kilohectares(),
        regions = features.len(),
        "classification summarized"
    );

    Ok(AnalysisOutcome {
        district: district.name.clone(),
        window,
        grid,
        scene_count: layers.len(),
        forest_mask: forest,
        composite,
        classification,
        area,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::UniformBaseline;
    use crate::registry::DistrictRegistry;
    use chrono::{TimeZone, Utc};
    use forestwatch_algorithms::imagery::{FLAGGED, INVALID};
    use forestwatch_core::{CRS, Error, GeoTransform, Scene, SceneIter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source returning clones of fixed scenes that match the window
    struct MemorySource {
        scenes: Vec<Scene>,
        fetches: AtomicUsize,
    }

    impl MemorySource {
        fn new(scenes: Vec<Scene>) -> Self {
            Self {
                scenes,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl SceneSource for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        fn fetch(&self, query: &SceneQuery) -> forestwatch_core::Result<SceneIter<'_>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let window = *query.window();
            Ok(Box::new(
                self.scenes
                    .iter()
                    .filter(move |s| window.contains(s.acquired))
                    .cloned()
                    .map(Ok),
            ))
        }
    }

    struct Unreachable;

    impl SceneSource for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn fetch(&self, _query: &SceneQuery) -> forestwatch_core::Result<SceneIter<'_>> {
            Err(Error::SourceUnavailable("connection refused".into()))
        }
    }

    /// 10x10 scene at 0.1 deg over Kurnool; NIR < Red (negative NDVI) in the top-left 2x2 block
    fn kurnool_scene(day: u32, qa_value: u16) -> Scene {
        let (rows, cols) = (10, 10);
        let mut nir = vec![0.5; rows * cols];
        let red = vec![0.2; rows * cols];
        for r in 0..2 {
            for c in 0..2 {
                nir[r * cols + c] = 0.1;
            }
        }
        let georef = |data: Vec<f64>| {
            let mut r = Raster::from_vec(data, rows, cols).unwrap();
            r.set_transform(GeoTransform::new(77.5, 16.3, 0.1, -0.1));
            r.set_crs(Some(CRS::wgs84()));
            r
        };
        let mut qa = Raster::filled(rows, cols, qa_value);
        qa.set_transform(GeoTransform::new(77.5, 16.3, 0.1, -0.1));
        qa.set_crs(Some(CRS::wgs84()));

        Scene::new(
            format!("scene-{day}"),
            Utc.with_ymd_and_hms(2024, 3, day, 5, 0, 0).unwrap(),
            georef(nir),
            georef(red),
            qa,
        )
        .unwrap()
    }

    fn coarse_config() -> AnalysisConfig {
        AnalysisConfig {
            // 0.1 degree cells
            ground_sampling_distance: 11_131.949_079_327_358,
            ..Default::default()
        }
    }

    fn march_window() -> DateWindow {
        DateWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn kurnool() -> District {
        DistrictRegistry::builtin().lookup("Kurnool District").unwrap().clone()
    }

    #[test]
    fn test_flags_negative_ndvi_block() {
        let source = MemorySource::new(vec![kurnool_scene(10, 0), kurnool_scene(20, 0)]);
        let outcome = run_analysis(
            &kurnool(),
            march_window(),
            &source,
            &UniformBaseline::new(80.0),
            &coarse_config(),
        )
        .unwrap();

        assert_eq!(outcome.scene_count, 2);
        assert_eq!(outcome.grid.shape(), (10, 10));
        assert_eq!(outcome.area.flagged_pixels, 4);
        assert!(outcome.area.square_meters > 0.0);
        assert_eq!(outcome.features.len(), 1);
        assert_eq!(outcome.classification.get(0, 0).unwrap(), FLAGGED);
        assert!(outcome.forest_mask.data().iter().all(|&v| v == 1));
    }

    #[test]
    fn test_zero_scenes_flags_nothing() {
        let source = MemorySource::new(vec![]);
        let outcome = run_analysis(
            &kurnool(),
            march_window(),
            &source,
            &UniformBaseline::new(80.0),
            &coarse_config(),
        )
        .unwrap();

        assert_eq!(outcome.scene_count, 0);
        assert_eq!(outcome.area.flagged_pixels, 0);
        assert_eq!(outcome.area.kilohectares(), 0.0);
        assert!(!outcome.has_deforestation());
        assert!(outcome.classification.data().iter().all(|&v| v == INVALID));
    }

    #[test]
    fn test_cloudy_scenes_contribute_nothing() {
        // QA bit 5 set everywhere
        let source = MemorySource::new(vec![kurnool_scene(10, 1 << 5)]);
        let outcome = run_analysis(
            &kurnool(),
            march_window(),
            &source,
            &UniformBaseline::new(80.0),
            &coarse_config(),
        )
        .unwrap();
        assert_eq!(outcome.area.flagged_pixels, 0);
        assert!(outcome.composite.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_baseline_at_threshold_is_not_forest() {
        let source = MemorySource::new(vec![kurnool_scene(10, 0)]);
        let outcome = run_analysis(
            &kurnool(),
            march_window(),
            &source,
            &UniformBaseline::new(30.0),
            &coarse_config(),
        )
        .unwrap();
        assert_eq!(outcome.area.flagged_pixels, 0);
        assert!(outcome.forest_mask.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_pixel_budget_checked_before_fetch() {
        let source = MemorySource::new(vec![kurnool_scene(10, 0)]);
        let config = AnalysisConfig {
            max_pixels: 50,
            ..coarse_config()
        };
        let err = run_analysis(&kurnool(), march_window(), &source, &UniformBaseline::new(80.0), &config)
            .unwrap_err();
        assert!(matches!(err, MonitorError::ResourceLimit { pixels: 100, budget: 50 }));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unreachable_source_is_reported() {
        let err = run_analysis(
            &kurnool(),
            march_window(),
            &Unreachable,
            &UniformBaseline::new(80.0),
            &coarse_config(),
        )
        .unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    }

    #[test]
    fn test_oversized_scene_is_cropped_to_district() {
        // 20x20 scene reaching 1 degree west and north of Kurnool, cloudy outside the district
        let (rows, cols) = (20, 20);
        let mut nir = vec![0.5; rows * cols];
        let mut qa = vec![1u16 << 5; rows * cols];
        for r in 10..20 {
            for c in 10..20 {
                qa[r * cols + c] = 0;
            }
        }
        for (r, c) in [(10, 10), (10, 11)] {
            nir[r * cols + c] = 0.1;
        }
        let transform = GeoTransform::new(76.5, 17.3, 0.1, -0.1);
        let band = |data: Vec<f64>| {
            let mut b = Raster::from_vec(data, rows, cols).unwrap();
            b.set_transform(transform);
            b.set_crs(Some(CRS::wgs84()));
            b
        };
        let mut qa = Raster::from_vec(qa, rows, cols).unwrap();
        qa.set_transform(transform);
        qa.set_crs(Some(CRS::wgs84()));
        let scene = Scene::new(
            "scene-wide",
            Utc.with_ymd_and_hms(2024, 3, 12, 5, 0, 0).unwrap(),
            band(nir),
            band(vec![0.2; rows * cols]),
            qa,
        )
        .unwrap();

        let outcome = run_analysis(
            &kurnool(),
            march_window(),
            &MemorySource::new(vec![scene]),
            &UniformBaseline::new(80.0),
            &coarse_config(),
        )
        .unwrap();

        assert_eq!(outcome.composite.shape(), (10, 10));
        assert_eq!(outcome.composite.valid_count(), 100);
        assert_eq!(outcome.area.flagged_pixels, 2);
        assert_eq!(outcome.classification.get(0, 0).unwrap(), FLAGGED);
        assert_eq!(outcome.classification.get(0, 1).unwrap(), FLAGGED);
    }
}
