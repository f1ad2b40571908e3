//! Scene data model and the imagery source seam
//!
//! A [`Scene`] is one satellite acquisition with the bands the monitor
//! needs. Catalog backends implement [`SceneSource`] and hand scenes back
//! lazily through a [`SceneIter`].

use crate::error::{Error, Result};
use crate::raster::Raster;
use chrono::{DateTime, Duration, Utc};
use geo::{BoundingRect, Polygon, Rect};

/// One acquisition: near-infrared, red and QA bands on a common grid.
///
/// NaN in `nir`/`red` marks invalid pixels. `qa` carries the quality
/// bitmask; its nodata value marks pixels without quality data.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub nir: Raster<f64>,
    pub red: Raster<f64>,
    pub qa: Raster<u16>,
    /// Derived vegetation index, present after index computation
    pub index: Option<Raster<f64>>,
}

impl Scene {
    /// Build a scene, checking that all bands share one shape
    pub fn new(
        id: impl Into<String>,
        acquired: DateTime<Utc>,
        nir: Raster<f64>,
        red: Raster<f64>,
        qa: Raster<u16>,
    ) -> Result<Self> {
        nir.check_same_shape(&red)?;
        nir.check_same_shape(&qa)?;
        Ok(Self {
            id: id.into(),
            acquired,
            nir,
            red,
            qa,
            index: None,
        })
    }

    /// Copy of this scene with the spectral bands replaced
    pub fn with_bands(&self, nir: Raster<f64>, red: Raster<f64>) -> Result<Self> {
        self.nir.check_same_shape(&nir)?;
        self.nir.check_same_shape(&red)?;
        Ok(Self {
            nir,
            red,
            ..self.clone()
        })
    }

    /// Copy of this scene carrying a derived index band
    pub fn with_index(&self, index: Raster<f64>) -> Result<Self> {
        self.nir.check_same_shape(&index)?;
        Ok(Self {
            index: Some(index),
            ..self.clone()
        })
    }
}

/// Half-open acquisition window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::invalid(
                "window",
                format!("{start}..{end}"),
                "start must not be after end",
            ));
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending at `end`
    pub fn lookback(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Check that a boundary's exterior ring is closed and has at least three
/// distinct vertices
pub fn validate_boundary(boundary: &Polygon<f64>) -> Result<()> {
    let ring = &boundary.exterior().0;
    if ring.first() != ring.last() {
        return Err(Error::invalid("boundary", ring.len(), "ring is not closed"));
    }

    let mut distinct: Vec<(f64, f64)> = Vec::new();
    for c in ring {
        if !distinct.iter().any(|&(x, y)| x == c.x && y == c.y) {
            distinct.push((c.x, c.y));
        }
    }
    if distinct.len() < 3 {
        return Err(Error::invalid(
            "boundary",
            distinct.len(),
            "at least 3 distinct vertices required",
        ));
    }
    Ok(())
}

/// A validated request for scenes over a boundary and a date window
#[derive(Debug, Clone)]
pub struct SceneQuery {
    boundary: Polygon<f64>,
    bbox: Rect<f64>,
    window: DateWindow,
}

impl SceneQuery {
    /// Validate the boundary ring and window.
    ///
    /// The exterior ring must be closed and have at least three distinct
    /// vertices.
    pub fn new(boundary: Polygon<f64>, window: DateWindow) -> Result<Self> {
        if window.start > window.end {
            return Err(Error::invalid(
                "window",
                format!("{}..{}", window.start, window.end),
                "start must not be after end",
            ));
        }

        validate_boundary(&boundary)?;

        let bbox = boundary
            .bounding_rect()
            .ok_or_else(|| Error::invalid("boundary", "empty", "no bounding box"))?;

        Ok(Self {
            boundary,
            bbox,
            window,
        })
    }

    pub fn boundary(&self) -> &Polygon<f64> {
        &self.boundary
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    /// Boundary bounding box as `(min_x, min_y, max_x, max_y)`
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        (min.x, min.y, max.x, max.y)
    }

    /// Whether a scene footprint `(min_x, min_y, max_x, max_y)` intersects the query bbox
    pub fn intersects(&self, footprint: (f64, f64, f64, f64)) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bbox();
        footprint.0 <= max_x && footprint.2 >= min_x && footprint.1 <= max_y && footprint.3 >= min_y
    }
}

/// Lazy, finite stream of scenes produced by one `fetch` call
pub type SceneIter<'a> = Box<dyn Iterator<Item = Result<Scene>> + 'a>;

/// A catalog of satellite scenes.
///
/// `fetch` returns only scenes acquired inside the query window that
/// intersect the boundary; calling it again restarts the stream.
/// Unreachable backends fail with [`Error::SourceUnavailable`].
pub trait SceneSource: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    fn fetch(&self, query: &SceneQuery) -> Result<SceneIter<'_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo::polygon;

    fn square() -> Polygon<f64> {
        polygon![(x: 77.5, y: 15.3), (x: 78.5, y: 15.3), (x: 78.5, y: 16.3), (x: 77.5, y: 16.3), (x: 77.5, y: 15.3)]
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_window_is_half_open() {
        let w = DateWindow::new(day(1), day(10)).unwrap();
        assert!(w.contains(day(1)));
        assert!(w.contains(day(9)));
        assert!(!w.contains(day(10)));
        assert!(DateWindow::new(day(10), day(1)).is_err());
    }

    #[test]
    fn test_zero_day_lookback_is_empty() {
        let w = DateWindow::lookback(day(5), 0);
        assert!(w.is_empty());
        assert!(!w.contains(day(5)));
    }

    #[test]
    fn test_query_validates_ring() {
        let w = DateWindow::lookback(day(20), 30);
        let q = SceneQuery::new(square(), w).unwrap();
        assert_eq!(q.bbox(), (77.5, 15.3, 78.5, 16.3));
        assert!(q.intersects((78.0, 16.0, 79.0, 17.0)));
        assert!(!q.intersects((80.0, 16.0, 81.0, 17.0)));

        let degenerate = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert!(SceneQuery::new(degenerate, w).is_err());
    }

    #[test]
    fn test_scene_rejects_mismatched_bands() {
        let nir = Raster::filled(2, 2, 0.5);
        let red = Raster::filled(2, 3, 0.5);
        let qa: Raster<u16> = Raster::filled(2, 2, 0);
        assert!(Scene::new("s", day(1), nir, red, qa).is_err());
    }
}
