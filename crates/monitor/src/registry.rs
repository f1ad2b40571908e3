//! District registry: district names mapped to WGS84 boundary polygons.

use forestwatch_core::validate_boundary;
use geo::{Coord, LineString, Polygon};
use geojson::GeoJson;

use crate::error::{MonitorError, Result};

/// A named administrative district
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    /// Lon/lat boundary with a closed exterior ring
    pub boundary: Polygon<f64>,
}

const BUILTIN: &[(&str, [(f64, f64); 4])] = &[
    ("Prakasam District", [(79.0, 15.0), (79.5, 15.0), (79.5, 15.8), (79.0, 15.8)]),
    ("Kurnool District", [(77.5, 15.3), (78.5, 15.3), (78.5, 16.3), (77.5, 16.3)]),
    ("Kadapa (YSR) District", [(78.0, 14.5), (79.0, 14.5), (79.0, 15.4), (78.0, 15.4)]),
    ("Guntur District", [(79.8, 15.8), (80.7, 15.8), (80.7, 16.6), (79.8, 16.6)]),
    ("Nandyal District", [(78.0, 15.0), (78.8, 15.0), (78.8, 15.8), (78.0, 15.8)]),
];

/// Ordered, read-only set of districts with unique names
#[derive(Debug, Clone)]
pub struct DistrictRegistry {
    districts: Vec<District>,
}

impl DistrictRegistry {
    /// The districts around the Nallamala forest
    pub fn builtin() -> Self {
        let districts = BUILTIN
            .iter()
            .map(|(name, vertices)| {
                let exterior: LineString<f64> = vertices.iter().map(|&(x, y)| Coord { x, y }).collect();
                District {
                    name: (*name).to_string(),
                    boundary: Polygon::new(exterior, vec![]),
                }
            })
            .collect();
        Self { districts }
    }

    /// Build a registry, rejecting duplicate names
    pub fn new(districts: Vec<District>) -> Result<Self> {
        for (i, d) in districts.iter().enumerate() {
            if districts[..i].iter().any(|other| other.name == d.name) {
                return Err(MonitorError::Registry(format!("duplicate district '{}'", d.name)));
            }
        }
        Ok(Self { districts })
    }

    /// Load districts from a GeoJSON FeatureCollection.
    ///
    /// Every feature needs a string `name` property and a Polygon geometry.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e| MonitorError::Registry(format!("invalid GeoJSON: {e}")))?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(MonitorError::Registry("expected a FeatureCollection".into()));
        };

        let districts = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let name = feature
                    .property("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| MonitorError::Registry(format!("feature {i}: missing string 'name' property")))?;

                let rings = match feature.geometry.as_ref().map(|g| &g.value) {
                    Some(geojson::Value::Polygon(rings)) => rings,
                    _ => {
                        return Err(MonitorError::Registry(format!(
                            "feature {i} ({name}): geometry must be a Polygon"
                        )));
                    }
                };
                let boundary = polygon_from_rings(rings)
                    .map_err(|e| MonitorError::Registry(format!("feature {i} ({name}): {e}")))?;
                validate_boundary(&boundary)
                    .map_err(|e| MonitorError::Registry(format!("feature {i} ({name}): {e}")))?;

                Ok(District {
                    name: name.to_string(),
                    boundary,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(districts)
    }

    /// Look up a district by exact name
    pub fn lookup(&self, name: &str) -> Result<&District> {
        self.districts
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| MonitorError::DistrictNotFound(name.to_string()))
    }

    /// District names in registry order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.districts.iter().map(|d| d.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &District> {
        self.districts.iter()
    }

    pub fn len(&self) -> usize {
        self.districts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }
}

impl Default for DistrictRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> std::result::Result<Polygon<f64>, String> {
    let to_ring = |(r, ring): (usize, &Vec<Vec<f64>>)| -> std::result::Result<LineString<f64>, String> {
        ring.iter()
            .enumerate()
            .map(|(v, p)| match p.as_slice() {
                [x, y, ..] => Ok(Coord { x: *x, y: *y }),
                _ => Err(format!("ring {r} vertex {v} needs two coordinates, got {}", p.len())),
            })
            .collect()
    };
    let mut rings = rings.iter().enumerate().map(to_ring);
    let exterior = rings.next().ok_or("empty polygon")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}
