//! Clipping rasters to a district boundary
//!
//! A pixel is inside when its centre is inside the polygon. Boundaries are
//! given in WGS84 lon/lat and projected onto the raster's CRS first.

use crate::maybe_rayon::*;
use forestwatch_core::raster::{GridSpec, Raster};
use forestwatch_core::{CRS, Result};
use geo::{Contains, Coord, MapCoords, Point, Polygon};

fn project_boundary(boundary: &Polygon<f64>, crs: &CRS) -> Result<Polygon<f64>> {
    let projection = crs.projection()?;
    Ok(boundary.map_coords(|c| {
        let (x, y) = projection.forward(c.x, c.y);
        Coord { x, y }
    }))
}

/// u8 mask on `grid`: 1 where the pixel centre lies inside `boundary`, else 0
pub fn boundary_mask(grid: &GridSpec, boundary: &Polygon<f64>) -> Result<Raster<u8>> {
    let polygon = project_boundary(boundary, &grid.crs)?;
    let (rows, cols) = grid.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = grid.pixel_to_geo(col, row);
                    u8::from(polygon.contains(&Point::new(x, y)))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Raster::on_grid(grid, 0u8).derive(data, None)
}

/// Set pixels whose centre lies outside `boundary` to NaN
pub fn clip_to_boundary(raster: &Raster<f64>, boundary: &Polygon<f64>) -> Result<Raster<f64>> {
    let mask = boundary_mask(&raster.grid_spec(), boundary)?;

    let data: Vec<f64> = raster
        .data()
        .iter()
        .zip(mask.data().iter())
        .map(|(&v, &inside)| if inside == 1 { v } else { f64::NAN })
        .collect();

    raster.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forestwatch_core::GeoTransform;
    use geo::polygon;

    fn triangle() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0)]
    }

    fn unit_grid() -> GridSpec {
        GridSpec::new(GeoTransform::new(0.0, 4.0, 1.0, -1.0), 4, 4, CRS::wgs84())
    }

    #[test]
    fn test_mask_uses_pixel_centres() {
        let mask = boundary_mask(&unit_grid(), &triangle()).unwrap();
        // Bottom row, y centre 0.5: x centre 3.5 falls on the hypotenuse
        assert_eq!(mask.get(3, 0).unwrap(), 1);
        assert_eq!(mask.get(3, 2).unwrap(), 1);
        assert_eq!(mask.get(3, 3).unwrap(), 0);
        // Top row, y centre 3.5: x centre 0.5 is on the hypotenuse too
        assert_eq!(mask.get(0, 0).unwrap(), 0);
        assert_eq!(mask.get(0, 1).unwrap(), 0);
    }

    #[test]
    fn test_clip_sets_outside_to_nan() {
        let mut raster = Raster::filled(4, 4, 0.7);
        raster.set_transform(unit_grid().transform);
        raster.set_crs(Some(CRS::wgs84()));

        let clipped = clip_to_boundary(&raster, &triangle()).unwrap();
        assert!((clipped.get(2, 1).unwrap() - 0.7).abs() < 1e-12);
        assert!(clipped.get(0, 3).unwrap().is_nan());
        assert_eq!(clipped.valid_count(), 6);
    }

    #[test]
    fn test_projected_grid_mask() {
        // 1 km UTM 44N cells around (78.0 E, 16.0 N)
        let crs = CRS::from_epsg(32644);
        let (cx, cy) = crs.projection().unwrap().forward(78.0, 16.0);
        let grid = GridSpec::new(GeoTransform::new(cx - 5000.0, cy + 5000.0, 1000.0, -1000.0), 10, 10, crs);
        let boundary = polygon![
            (x: 77.99, y: 15.99), (x: 78.01, y: 15.99), (x: 78.01, y: 16.01), (x: 77.99, y: 16.01), (x: 77.99, y: 15.99)
        ];
        let mask = boundary_mask(&grid, &boundary).unwrap();
        assert_eq!(mask.get(5, 5).unwrap(), 1);
        assert_eq!(mask.get(0, 0).unwrap(), 0);
    }
}
