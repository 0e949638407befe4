//! Great-circle distance oracle and the matching matrix provider.
//!
//! Straight-line estimates ignore the road network but are always
//! available, so they drive the local heuristics and seed remote batching.

use crate::model::Coordinates;
use crate::traits::DistanceMatrixProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance reported when either endpoint has no coordinates.
///
/// Compares greater than any real distance.
pub const UNKNOWN_DISTANCE: f64 = f64::INFINITY;

/// Haversine distance between two points in meters.
pub fn haversine_m(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lng1) = from.as_tuple();
    let (lat2, lng2) = to.as_tuple();

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c * 1000.0
}

/// Distance between two possibly unlocated points.
pub fn distance(from: Option<Coordinates>, to: Option<Coordinates>) -> f64 {
    match (from, to) {
        (Some(from), Some(to)) => haversine_m(from, to),
        _ => UNKNOWN_DISTANCE,
    }
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Coordinates]) -> Vec<Vec<f64>> {
        let n = locations.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let meters = haversine_m(locations[i], locations[j]);
                matrix[i][j] = meters;
                matrix[j][i] = meters;
            }
        }

        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn test_haversine_same_point() {
        assert_eq!(haversine_m(at(36.1, -115.1), at(36.1, -115.1)), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas to Los Angeles is roughly 370 km.
        let dist = haversine_m(at(36.17, -115.14), at(34.05, -118.24));
        assert!(dist > 350_000.0 && dist < 400_000.0, "got {}", dist);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = at(-23.55, -46.63);
        let b = at(-22.90, -43.17);
        assert_eq!(haversine_m(a, b), haversine_m(b, a));
    }

    #[test]
    fn test_antipodal_points_do_not_nan() {
        let dist = haversine_m(at(0.0, 0.0), at(0.0, 180.0));
        assert!(dist.is_finite());
        assert!((dist - std::f64::consts::PI * EARTH_RADIUS_KM * 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_unknown_endpoint_is_infinite() {
        assert_eq!(distance(None, Some(at(1.0, 1.0))), UNKNOWN_DISTANCE);
        assert_eq!(distance(Some(at(1.0, 1.0)), None), UNKNOWN_DISTANCE);
        assert!(distance(Some(at(0.0, 0.0)), Some(at(80.0, 170.0))) < UNKNOWN_DISTANCE);
    }

    #[test]
    fn test_matrix_diagonal_is_zero_and_symmetric() {
        let locations = vec![at(36.1, -115.1), at(36.2, -115.2), at(36.3, -115.3)];
        let matrix = HaversineMatrix.matrix_for(&locations);

        for i in 0..locations.len() {
            assert_eq!(matrix[i][i], 0.0);
            for j in 0..locations.len() {
                assert_eq!(matrix[i][j], matrix[j][i]);
            }
        }
    }
}
