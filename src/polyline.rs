//! Polyline representation for route geometries.
//!
//! Points are stored as `[lng, lat]` pairs, the order the routing service
//! uses for GeoJSON coordinates, so matched geometry passes through untouched.

use serde::{Deserialize, Serialize};

use crate::model::BoundingBox;

/// A road-snapped route geometry as an ordered sequence of `[lng, lat]` points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<[f64; 2]>,
}

impl Polyline {
    /// Creates a new Polyline from `[lng, lat]` points.
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<[f64; 2]> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<[f64; 2]> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<[f64; 2]> {
        self.points.last().copied()
    }

    /// Appends another polyline's points after this one's.
    pub fn extend(&mut self, other: &Polyline) {
        self.points.extend_from_slice(&other.points);
    }

    /// Returns the concatenation of `self` followed by `other`.
    pub fn concat(&self, other: &Polyline) -> Polyline {
        let mut joined = self.clone();
        joined.extend(other);
        joined
    }

    /// Smallest box containing every point, or `None` for an empty polyline.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let (&[lng0, lat0], rest) = self.points.split_first()?;
        let mut bbox = BoundingBox {
            min_lng: lng0,
            min_lat: lat0,
            max_lng: lng0,
            max_lat: lat0,
        };
        for &[lng, lat] in rest {
            bbox.min_lng = bbox.min_lng.min(lng);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lng = bbox.max_lng.max(lng);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }
}

impl From<Vec<[f64; 2]>> for Polyline {
    fn from(points: Vec<[f64; 2]>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_points() {
        let points = vec![[-120.2, 38.5], [-120.95, 40.7], [-126.453, 43.252]];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.points(), &points[..]);
        assert_eq!(polyline.len(), 3);
    }

    #[test]
    fn test_into_points() {
        let points = vec![[-120.2, 38.5], [-120.95, 40.7]];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.into_points(), points);
    }

    #[test]
    fn test_empty_polyline() {
        let polyline = Polyline::default();
        assert!(polyline.is_empty());
        assert!(polyline.bounding_box().is_none());
        assert!(polyline.first().is_none());
    }

    #[test]
    fn test_concat_keeps_order() {
        let a = Polyline::new(vec![[1.0, 2.0], [3.0, 4.0]]);
        let b = Polyline::new(vec![[5.0, 6.0]]);
        let joined = a.concat(&b);
        assert_eq!(joined.points(), &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(joined.last(), Some([5.0, 6.0]));
        // inputs untouched
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_bounding_box() {
        let polyline = Polyline::new(vec![[-115.2, 36.1], [-115.1, 36.3], [-115.3, 36.2]]);
        let bbox = polyline.bounding_box().unwrap();
        assert_eq!(bbox.as_array(), [-115.3, 36.1, -115.1, 36.3]);
    }

    #[test]
    fn test_single_point_bounding_box() {
        let polyline = Polyline::new(vec![[1.5, 2.5]]);
        let bbox = polyline.bounding_box().unwrap();
        assert_eq!(bbox.min_lng, bbox.max_lng);
        assert_eq!(bbox.min_lat, 2.5);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let polyline = Polyline::new(vec![[1.0, 2.0]]);
        let json = serde_json::to_string(&polyline).unwrap();
        assert_eq!(json, "[[1.0,2.0]]");
    }
}
