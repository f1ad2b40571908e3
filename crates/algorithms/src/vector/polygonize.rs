//! Raster-to-polygon conversion of flagged regions
//!
//! Connected flagged pixels are labelled, then each region's outline is
//! traced along pixel edges. Every boundary edge is directed so the region
//! lies on one side; following edge to edge closes rings. Exterior rings
//! come out counter-clockwise in map coordinates and holes clockwise.

use crate::imagery::FLAGGED;
use crate::maybe_rayon::*;
use crate::statistics::check_pixel_budget;
use forestwatch_core::raster::{GeoTransform, Raster};
use forestwatch_core::vector::{AttributeValue, Feature, FeatureCollection};
use forestwatch_core::{Algorithm, Error, Result};
use geo::{Coord, Geometry, LineString, Polygon};
use ndarray::Array2;
use std::collections::HashMap;

/// Parameters for [`vectorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorizeParams {
    /// Join pixels touching at a corner into one region. Default: true
    pub eight_connected: bool,
    /// Largest pixel count the vectorizer may touch. Default: 1e13
    pub max_pixels: u64,
}

impl Default for VectorizeParams {
    fn default() -> Self {
        Self {
            eight_connected: true,
            max_pixels: 10_000_000_000_000,
        }
    }
}

const NEIGHBORS_4: [(isize, isize); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];
const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Label connected flagged regions, numbered from 1 in row-major order of
/// their first pixel. Unflagged pixels get label 0.
///
/// Returns the label grid and each region's pixels as `(row, col)`.
pub fn label_regions(
    classification: &Raster<u8>,
    eight_connected: bool,
) -> (Array2<u32>, Vec<Vec<(usize, usize)>>) {
    let (rows, cols) = classification.shape();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut regions: Vec<Vec<(usize, usize)>> = Vec::new();
    let offsets: &[(isize, isize)] = if eight_connected { &NEIGHBORS_8 } else { &NEIGHBORS_4 };

    for row in 0..rows {
        for col in 0..cols {
            if labels[(row, col)] != 0 || classification.data()[(row, col)] != FLAGGED {
                continue;
            }

            let label = regions.len() as u32 + 1;
            let mut pixels = Vec::new();
            let mut stack = vec![(row, col)];
            labels[(row, col)] = label;

            while let Some((r, c)) = stack.pop() {
                pixels.push((r, c));
                for &(dr, dc) in offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if labels[(nr, nc)] == 0 && classification.data()[(nr, nc)] == FLAGGED {
                        labels[(nr, nc)] = label;
                        stack.push((nr, nc));
                    }
                }
            }

            pixels.sort_unstable();
            regions.push(pixels);
        }
    }

    (labels, regions)
}

/// Convert contiguous flagged regions into polygon features.
///
/// One Polygon feature per region, with properties `label` (region number)
/// and `count` (pixel count). Coordinates are pixel corners mapped through
/// the raster's geotransform; collinear vertices are dropped.
pub fn vectorize(classification: &Raster<u8>, params: &VectorizeParams) -> Result<FeatureCollection> {
    let (rows, cols) = classification.shape();
    check_pixel_budget(rows, cols, params.max_pixels)?;

    let (_, regions) = label_regions(classification, params.eight_connected);
    let transform = *classification.transform();
    let is_flagged = |r: isize, c: isize| {
        r >= 0
            && c >= 0
            && (r as usize) < rows
            && (c as usize) < cols
            && classification.data()[(r as usize, c as usize)] == FLAGGED
    };

    let features: Vec<Feature> = regions
        .into_par_iter()
        .enumerate()
        .map(|(i, pixels)| {
            let edges = boundary_edges(&pixels, &is_flagged);
            let rings = trace_rings(&edges, params.eight_connected)?;
            let polygon = rings_to_polygon(rings, &transform)?;

            let mut feature = Feature::new(Geometry::Polygon(polygon));
            let label = i as i64 + 1;
            feature.id = Some(label.to_string());
            feature.set_property("label", AttributeValue::Int(label));
            feature.set_property("count", AttributeValue::Int(pixels.len() as i64));
            Ok(feature)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(features.into_iter().collect())
}

/// A directed unit edge between lattice vertices `(x, y)`, tagged with the
/// pixel `(row, col)` it bounds
#[derive(Debug, Clone, Copy)]
struct Edge {
    from: (usize, usize),
    to: (usize, usize),
    pixel: (usize, usize),
}

// Edges run counter-clockwise around each pixel as drawn north-up.
fn boundary_edges(pixels: &[(usize, usize)], is_flagged: &impl Fn(isize, isize) -> bool) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(pixels.len() * 2);
    for &(r, c) in pixels {
        let (ri, ci) = (r as isize, c as isize);
        let pixel = (r, c);
        if !is_flagged(ri - 1, ci) {
            edges.push(Edge { from: (c + 1, r), to: (c, r), pixel });
        }
        if !is_flagged(ri, ci + 1) {
            edges.push(Edge { from: (c + 1, r + 1), to: (c + 1, r), pixel });
        }
        if !is_flagged(ri + 1, ci) {
            edges.push(Edge { from: (c, r + 1), to: (c + 1, r + 1), pixel });
        }
        if !is_flagged(ri, ci - 1) {
            edges.push(Edge { from: (c, r), to: (c, r + 1), pixel });
        }
    }
    edges
}

/// Follow edges into closed rings of lattice vertices.
///
/// Two regions' pixels meeting only at a corner leave two outgoing edges at
/// that vertex. With 8-connectivity the ring crosses over to the other
/// pixel, keeping the region in one ring; with 4-connectivity it stays on
/// the same pixel.
fn trace_rings(edges: &[Edge], eight_connected: bool) -> Result<Vec<Vec<(usize, usize)>>> {
    let mut outgoing: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let next = |i: usize| -> Option<usize> {
        let e = &edges[i];
        let candidates = outgoing.get(&e.to)?;
        match candidates.as_slice() {
            [only] => Some(*only),
            _ => candidates
                .iter()
                .copied()
                .find(|&j| (edges[j].pixel == e.pixel) != eight_connected)
                .or_else(|| candidates.first().copied()),
        }
    };

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut i = start;
        loop {
            if used[i] || ring.len() > edges.len() {
                return Err(Error::Algorithm("pixel boundary did not close".into()));
            }
            used[i] = true;
            ring.push(edges[i].from);
            i = next(i).ok_or_else(|| Error::Algorithm("dangling pixel boundary edge".into()))?;
            if i == start {
                break;
            }
        }
        rings.push(drop_collinear(&ring));
    }

    Ok(rings)
}

fn drop_collinear(ring: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let n = ring.len();
    let step = |a: (usize, usize), b: (usize, usize)| {
        (b.0 as isize - a.0 as isize, b.1 as isize - a.1 as isize)
    };
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed shoelace area in lattice units
fn doubled_area(ring: &[(usize, usize)]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x1, y1) = ring[i];
            let (x2, y2) = ring[(i + 1) % n];
            x1 as i64 * y2 as i64 - x2 as i64 * y1 as i64
        })
        .sum()
}

fn rings_to_polygon(mut rings: Vec<Vec<(usize, usize)>>, transform: &GeoTransform) -> Result<Polygon<f64>> {
    let exterior_idx = rings
        .iter()
        .enumerate()
        .max_by_key(|(_, ring)| doubled_area(ring).abs())
        .map(|(i, _)| i)
        .ok_or_else(|| Error::Algorithm("region has no boundary".into()))?;

    let exterior = rings.swap_remove(exterior_idx);
    let to_line = |ring: &[(usize, usize)]| {
        let mut coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(x, y)| {
                let (gx, gy) = transform.pixel_to_geo_corner(x, y);
                Coord { x: gx, y: gy }
            })
            .collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        LineString::new(coords)
    };

    let holes = rings.iter().map(|r| to_line(r)).collect();
    Ok(Polygon::new(to_line(&exterior), holes))
}

/// Region vectorization as a pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct Vectorize;

impl Algorithm for Vectorize {
    type Input = Raster<u8>;
    type Output = FeatureCollection;
    type Params = VectorizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Vectorize"
    }

    fn description(&self) -> &'static str {
        "Trace contiguous flagged regions into polygon features"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        vectorize(&input, &params)
    }
}
