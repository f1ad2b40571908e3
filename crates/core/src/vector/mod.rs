//! Vector features produced by vectorization and district boundaries

use geo_types::{Geometry, Polygon};
use geojson::{GeoJson, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&AttributeValue> for JsonValue {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Null => JsonValue::Null,
            AttributeValue::Bool(b) => JsonValue::from(*b),
            AttributeValue::Int(i) => JsonValue::from(*i),
            AttributeValue::Float(f) => JsonValue::from(*f),
            AttributeValue::String(s) => JsonValue::from(s.as_str()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    /// Ordered so exported properties are stable
    pub properties: BTreeMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// The geometry as a polygon, if it is one
    pub fn polygon(&self) -> Option<&Polygon<f64>> {
        match &self.geometry {
            Some(Geometry::Polygon(p)) => Some(p),
            _ => None,
        }
    }

    fn to_geojson(&self) -> geojson::Feature {
        let properties: JsonObject = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(v)))
            .collect();

        geojson::Feature {
            bbox: None,
            geometry: self
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: self.id.clone().map(geojson::feature::Id::String),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Polygon rings of every feature as `[[[x, y], ...], ...]`, exterior first.
    ///
    /// This is the nested coordinate list shown to users for deforested areas.
    pub fn ring_coordinates(&self) -> Vec<Vec<Vec<[f64; 2]>>> {
        self.features
            .iter()
            .filter_map(Feature::polygon)
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                    .collect()
            })
            .collect()
    }

    /// Serialize as a GeoJSON FeatureCollection
    pub fn to_geojson(&self) -> GeoJson {
        GeoJson::FeatureCollection(geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(Feature::to_geojson).collect(),
            foreign_members: None,
        })
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
