//! Stage-chain checks: NDVI through compositing and classification into
//! flagged area and polygons, on a small WGS84 grid near 16 N.

use approx::assert_relative_eq;
use forestwatch_algorithms::imagery::{
    classify, median_composite, ndvi, ClassifyParams, FLAGGED, INVALID, NOT_FLAGGED,
};
use forestwatch_algorithms::statistics::{total_area, AreaParams};
use forestwatch_algorithms::vector::{spherical_area, vectorize, VectorizeParams};
use forestwatch_core::{GeoTransform, GridSpec, Raster, CRS};

// ── Fixtures ────────────────────────────────────────────────────────────

const CELL: f64 = 0.001;

fn grid(rows: usize, cols: usize) -> GridSpec {
    GridSpec::new(GeoTransform::new(78.0, 16.0, CELL, -CELL), rows, cols, CRS::wgs84())
}

fn band(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
    let spec = grid(rows, cols);
    let mut r = Raster::from_vec(values, rows, cols).unwrap();
    r.set_transform(spec.transform);
    r.set_crs(Some(spec.crs));
    r
}

fn classification(values: Vec<u8>, rows: usize, cols: usize) -> Raster<u8> {
    let spec = grid(rows, cols);
    let mut r = Raster::from_vec(values, rows, cols).unwrap();
    r.set_transform(spec.transform);
    r.set_crs(Some(spec.crs));
    r.set_nodata(Some(INVALID));
    r
}

// ── Tests ───────────────────────────────────────────────────────────────

#[test]
fn area_grows_with_flagged_pixels_and_is_repeatable() {
    let (rows, cols) = (4, 5);
    let mut values = vec![NOT_FLAGGED; rows * cols];
    let mut previous = 0.0;

    for i in 0..values.len() {
        values[i] = FLAGGED;
        let raster = classification(values.clone(), rows, cols);
        let first = total_area(&raster, &AreaParams::default()).unwrap();
        let second = total_area(&raster, &AreaParams::default()).unwrap();

        assert_eq!(first, second, "same input, same summary");
        assert_eq!(first.flagged_pixels, i as u64 + 1);
        assert!(
            first.square_meters > previous,
            "area dropped from {previous} to {} at pixel {i}",
            first.square_meters
        );
        previous = first.square_meters;
    }
}

#[test]
fn equal_bands_are_not_flagged() {
    let nir = band(vec![1200.0, 0.0], 1, 2);
    let red = band(vec![1200.0, 0.0], 1, 2);

    let index = ndvi(&nir, &red).unwrap();
    assert_eq!(index.get(0, 0).unwrap(), 0.0);

    let out = classify(&index, &ClassifyParams::default()).unwrap();
    assert_eq!(out.data().as_slice().unwrap(), &[NOT_FLAGGED, INVALID]);
}

#[test]
fn zero_reflectance_pixel_is_dropped_everywhere() {
    let (rows, cols) = (1, 3);
    let spec = grid(rows, cols);
    // Pixel 0 is dark in every scene, pixel 1 is cleared, pixel 2 is forest
    let scenes = [
        (vec![0.0, 0.1, 0.6], vec![0.0, 0.3, 0.1]),
        (vec![0.0, 0.2, 0.5], vec![0.0, 0.4, 0.1]),
    ];
    let layers: Vec<Raster<f64>> = scenes
        .into_iter()
        .map(|(n, r)| ndvi(&band(n, rows, cols), &band(r, rows, cols)).unwrap())
        .collect();

    let composite = median_composite(&layers, &spec).unwrap();
    assert!(composite.get(0, 0).unwrap().is_nan());
    assert!(composite.get(0, 1).unwrap() < 0.0);
    assert!(composite.get(0, 2).unwrap() > 0.0);
    assert_eq!(composite.valid_count(), 2);

    let flagged = classify(&composite, &ClassifyParams::default()).unwrap();
    assert_eq!(flagged.data().as_slice().unwrap(), &[INVALID, FLAGGED, NOT_FLAGGED]);

    let area = total_area(&flagged, &AreaParams::default()).unwrap();
    assert_eq!(area.flagged_pixels, 1);
    assert_eq!(area.processed_pixels, 2);

    let fc = vectorize(&flagged, &VectorizeParams::default()).unwrap();
    assert_eq!(fc.len(), 1);
    let poly = fc.features[0].polygon().unwrap();
    let xs: Vec<f64> = poly.exterior().coords().map(|c| c.x).collect();
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    assert_relative_eq!(min_x, 78.0 + CELL, max_relative = 1e-12);
}

#[test]
fn single_pixel_polygon_matches_ground_area() {
    let flagged = classification(vec![NOT_FLAGGED, FLAGGED, NOT_FLAGGED, NOT_FLAGGED], 2, 2);

    let area = total_area(&flagged, &AreaParams::default()).unwrap();
    let fc = vectorize(&flagged, &VectorizeParams::default()).unwrap();
    assert_eq!(fc.len(), 1);

    let ring_area = spherical_area(fc.features[0].polygon().unwrap());
    // About 107 m x 111 m near 16 N
    assert!(area.square_meters > 11_000.0 && area.square_meters < 13_000.0);
    assert_relative_eq!(ring_area, area.square_meters, max_relative = 1e-9);
}
