//! Ground area of flagged pixels

use crate::imagery::FLAGGED;
use crate::maybe_rayon::*;
use forestwatch_core::crs::{Projection, EARTH_RADIUS_M};
use forestwatch_core::raster::{GeoTransform, Raster};
use forestwatch_core::{CRS, Error, Result};

/// Largest pixel count a reduction may touch. Default: 1e13
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaParams {
    pub max_pixels: u64,
}

impl Default for AreaParams {
    fn default() -> Self {
        Self {
            max_pixels: 10_000_000_000_000,
        }
    }
}

/// Result of [`total_area`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AreaSummary {
    pub square_meters: f64,
    /// Pixels classified as flagged
    pub flagged_pixels: u64,
    /// Valid pixels examined (flagged or not)
    pub processed_pixels: u64,
}

impl AreaSummary {
    pub fn hectares(&self) -> f64 {
        self.square_meters / 1e4
    }

    /// Thousands of hectares
    pub fn kilohectares(&self) -> f64 {
        self.square_meters / 1e7
    }
}

/// Fail with `ResourceLimit` when a `rows x cols` grid exceeds the budget
pub fn check_pixel_budget(rows: usize, cols: usize, max_pixels: u64) -> Result<u64> {
    let pixels = (rows as u64).saturating_mul(cols as u64);
    if pixels > max_pixels {
        return Err(Error::ResourceLimit {
            pixels,
            budget: max_pixels,
        });
    }
    Ok(pixels)
}

/// Ground area in m² of one pixel in each row of a north-up grid.
///
/// Geographic grids use the spherical zone between the row's top and bottom
/// latitudes: `R² · Δλ · |sin φ_top − sin φ_bottom|`. Projected grids use
/// `|pixel_width · pixel_height|`.
pub fn row_pixel_areas(transform: &GeoTransform, crs: &CRS, rows: usize) -> Result<Vec<f64>> {
    match crs.projection()? {
        Projection::Utm { .. } => {
            let a = (transform.pixel_width * transform.pixel_height).abs();
            Ok(vec![a; rows])
        }
        Projection::Geographic => {
            let d_lon = transform.pixel_width.abs().to_radians();
            let r2 = EARTH_RADIUS_M * EARTH_RADIUS_M;
            Ok((0..rows)
                .map(|row| {
                    let top = transform.origin_y + row as f64 * transform.pixel_height;
                    let bottom = top + transform.pixel_height;
                    r2 * d_lon * (top.to_radians().sin() - bottom.to_radians().sin()).abs()
                })
                .collect())
        }
    }
}

/// Sum the ground area of pixels equal to [`FLAGGED`].
///
/// Invalid pixels (the raster's nodata) are skipped. The pixel budget is
/// checked before any work.
pub fn total_area(classification: &Raster<u8>, params: &AreaParams) -> Result<AreaSummary> {
    let (rows, cols) = classification.shape();
    check_pixel_budget(rows, cols, params.max_pixels)?;

    let crs = classification.crs().cloned().unwrap_or_default();
    let areas = row_pixel_areas(classification.transform(), &crs, rows)?;

    let per_row: Vec<(f64, u64, u64)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut flagged = 0u64;
            let mut processed = 0u64;
            for col in 0..cols {
                let v = unsafe { classification.get_unchecked(row, col) };
                if classification.is_nodata(v) {
                    continue;
                }
                processed += 1;
                if v == FLAGGED {
                    flagged += 1;
                }
            }
            (flagged as f64 * areas[row], flagged, processed)
        })
        .collect();

    Ok(per_row.into_iter().fold(AreaSummary::default(), |acc, (m2, f, p)| AreaSummary {
        square_meters: acc.square_meters + m2,
        flagged_pixels: acc.flagged_pixels + f,
        processed_pixels: acc.processed_pixels + p,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::{INVALID, NOT_FLAGGED};
    use approx::assert_relative_eq;

    fn classification(values: Vec<u8>, rows: usize, cols: usize, gt: GeoTransform, crs: CRS) -> Raster<u8> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(gt);
        r.set_crs(Some(crs));
        r.set_nodata(Some(INVALID));
        r
    }

    #[test]
    fn test_projected_pixels_are_rectangles() {
        let c = classification(
            vec![FLAGGED, NOT_FLAGGED, FLAGGED, INVALID],
            2,
            2,
            GeoTransform::new(500_000.0, 1_800_000.0, 30.0, -30.0),
            CRS::from_epsg(32644),
        );
        let s = total_area(&c, &AreaParams::default()).unwrap();
        assert_relative_eq!(s.square_meters, 1800.0);
        assert_eq!(s.flagged_pixels, 2);
        assert_eq!(s.processed_pixels, 3);
        assert_relative_eq!(s.hectares(), 0.18);
        assert_relative_eq!(s.kilohectares(), 0.00018);
    }

    #[test]
    fn test_geographic_pixel_area_at_equator() {
        // One 1x1 degree cell from the equator to 1 N
        let c = classification(vec![FLAGGED], 1, 1, GeoTransform::new(0.0, 1.0, 1.0, -1.0), CRS::wgs84());
        let s = total_area(&c, &AreaParams::default()).unwrap();
        let expected = EARTH_RADIUS_M * EARTH_RADIUS_M * 1f64.to_radians() * 1f64.to_radians().sin();
        assert_relative_eq!(s.square_meters, expected, max_relative = 1e-12);
        // Roughly 111.3 km x 111.3 km
        assert!((s.square_meters / 1e6 - 12_391.0).abs() < 5.0, "got {}", s.square_meters / 1e6);
    }

    #[test]
    fn test_all_invalid_is_zero() {
        let c = classification(vec![INVALID; 6], 2, 3, GeoTransform::default(), CRS::wgs84());
        let s = total_area(&c, &AreaParams::default()).unwrap();
        assert_eq!(s, AreaSummary::default());
    }

    #[test]
    fn test_budget_exceeded() {
        let c = classification(vec![FLAGGED; 12], 3, 4, GeoTransform::default(), CRS::wgs84());
        let err = total_area(&c, &AreaParams { max_pixels: 11 }).unwrap_err();
        match err {
            Error::ResourceLimit { pixels, budget } => {
                assert_eq!(pixels, 12);
                assert_eq!(budget, 11);
            }
            other => panic!("expected ResourceLimit, got {other:?}"),
        }
        assert!(total_area(&c, &AreaParams { max_pixels: 12 }).is_ok());
    }
}
