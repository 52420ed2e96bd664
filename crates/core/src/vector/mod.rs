//! Vector feature types
//!
//! The pipeline's vector products are polygon sets carrying a single integer
//! attribute: the source raster value the polygon was extracted from,
//! conventionally called DN.

use crate::crs::CRS;
use geo_types::Polygon;
use serde::{Deserialize, Serialize};

/// A polygon feature (possibly multi-ring) with its DN attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Polygon geometry; interior rings are holes
    pub geometry: Polygon<f64>,
    /// Source raster value the polygon was extracted from
    pub dn: i32,
}

impl Feature {
    /// Create a new feature
    pub fn new(geometry: Polygon<f64>, dn: i32) -> Self {
        Self { geometry, dn }
    }
}

/// Collection of features sharing one coordinate reference system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with a CRS
    pub fn with_crs(crs: Option<CRS>) -> Self {
        Self {
            features: Vec::new(),
            crs,
        }
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

    /// Append another collection's features
    pub fn extend(&mut self, other: FeatureCollection) {
        self.features.extend(other.features);
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Polygon};

    fn unit_square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        )
    }

    #[test]
    fn test_collection_push() {
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(32720)));
        fc.push(Feature::new(unit_square(), 1));
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].dn, 1);
    }

    #[test]
    fn test_collection_serde_roundtrip() {
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(4326)));
        fc.push(Feature::new(unit_square(), 2));

        let json = serde_json::to_string(&fc).unwrap();
        let back: FeatureCollection = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(back.features[0].dn, 2);
        assert_eq!(back.crs, Some(CRS::from_epsg(4326)));
    }
}
