//! Polyline representation for route geometries.
//!
//! Points are kept as decoded (latitude, longitude) pairs internally. On the
//! wire a polyline is a GeoJSON `LineString`, which orders each position as
//! `[longitude, latitude]`.

use serde::{Deserialize, Serialize};

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LineString", try_from = "LineString")]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a new Polyline from (latitude, longitude) points.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Joins consecutive legs into one line.
    ///
    /// When a leg starts where the previous one ended, the shared point is
    /// kept once.
    pub fn concat<I>(legs: I) -> Self
    where
        I: IntoIterator<Item = Polyline>,
    {
        let mut points: Vec<(f64, f64)> = Vec::new();
        for leg in legs {
            let mut leg_points = leg.into_points().into_iter().peekable();
            if let (Some(last), Some(first)) = (points.last(), leg_points.peek()) {
                if same_point(*last, *first) {
                    leg_points.next();
                }
            }
            points.extend(leg_points);
        }
        Self { points }
    }
}

fn same_point(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
}

/// GeoJSON LineString geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<[f64; 2]>,
}

impl From<Polyline> for LineString {
    fn from(polyline: Polyline) -> Self {
        Self {
            kind: "LineString".to_string(),
            coordinates: polyline
                .points
                .into_iter()
                .map(|(lat, lng)| [lng, lat])
                .collect(),
        }
    }
}

impl TryFrom<LineString> for Polyline {
    type Error = String;

    fn try_from(line: LineString) -> Result<Self, Self::Error> {
        if line.kind != "LineString" {
            return Err(format!("expected LineString geometry, got {}", line.kind));
        }
        Ok(Self::new(
            line.coordinates
                .into_iter()
                .map(|[lng, lat]| (lat, lng))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_points() {
        let points = vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.points(), &points[..]);
    }

    #[test]
    fn test_serializes_as_geojson_lng_lat() {
        let polyline = Polyline::new(vec![(38.5, -120.2), (40.7, -120.95)]);
        let json = serde_json::to_value(&polyline).unwrap();
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][0][0], -120.2);
        assert_eq!(json["coordinates"][0][1], 38.5);
    }

    #[test]
    fn test_deserializes_geojson() {
        let json = r#"{"type":"LineString","coordinates":[[-46.6,-23.5],[-46.7,-23.6]]}"#;
        let polyline: Polyline = serde_json::from_str(json).unwrap();
        assert_eq!(polyline.points(), &[(-23.5, -46.6), (-23.6, -46.7)]);
    }

    #[test]
    fn test_rejects_other_geometry_types() {
        let json = r#"{"type":"Point","coordinates":[[1.0,2.0]]}"#;
        assert!(serde_json::from_str::<Polyline>(json).is_err());
    }

    #[test]
    fn test_concat_drops_shared_junction() {
        let first = Polyline::new(vec![(0.0, 0.0), (0.0, 1.0)]);
        let second = Polyline::new(vec![(0.0, 1.0), (1.0, 1.0)]);
        let third = Polyline::new(vec![(2.0, 2.0)]);
        let joined = Polyline::concat(vec![first, second, third]);
        assert_eq!(
            joined.points(),
            &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 2.0)]
        );
    }

    #[test]
    fn test_empty_polyline() {
        let polyline = Polyline::concat(Vec::new());
        assert!(polyline.is_empty());
    }
}
