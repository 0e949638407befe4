//! OSRM HTTP adapter for the trip service.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Coordinates, is_plain_profile};
use crate::polyline::Polyline;
use crate::traits::{TripOptimizer, TripPlan, TripWaypoint};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn trip_url(&self, locations: &[Coordinates], profile: &str) -> String {
        let coords = locations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng(), c.lat()))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/trip/v1/{}/{}?source=first&destination=last&roundtrip=false&geometries=geojson&overview=full",
            self.config.base_url.trim_end_matches('/'),
            profile,
            coords
        )
    }
}

impl TripOptimizer for OsrmClient {
    fn optimize_trip(&self, locations: &[Coordinates], profile: &str) -> Result<TripPlan> {
        if !is_plain_profile(profile) {
            return Err(Error::validation(format!("unsupported profile {profile:?}")));
        }
        let response = self.client.get(self.trip_url(locations, profile)).send()?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<OsrmTripResponse>()
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<OsrmTripResponse>()?;
        plan_from_response(body, locations.len())
    }
}

/// Converts a trip response into a tagged plan.
///
/// OSRM echoes `waypoints` in request order, so an entry's array position
/// is its input index and `waypoint_index` its place in the trip.
fn plan_from_response(body: OsrmTripResponse, requested: usize) -> Result<TripPlan> {
    if body.code != "Ok" {
        return Err(Error::Upstream {
            status: 200,
            message: format!(
                "{}: {}",
                body.code,
                body.message.unwrap_or_default()
            ),
        });
    }

    let waypoints = body.waypoints.unwrap_or_default();
    if waypoints.len() != requested {
        return Err(Error::malformed(format!(
            "requested {} waypoints, OSRM echoed {}",
            requested,
            waypoints.len()
        )));
    }
    if waypoints.iter().any(|w| w.trips_index != 0) {
        return Err(Error::malformed("waypoints split across several trips"));
    }

    let trip = body
        .trips
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| Error::malformed("response has no trip"))?;

    Ok(TripPlan {
        waypoints: waypoints
            .iter()
            .enumerate()
            .map(|(input_index, w)| TripWaypoint {
                input_index,
                trip_position: w.waypoint_index,
            })
            .collect(),
        distance: trip.distance,
        duration: trip.duration,
        geometry: trip.geometry,
    })
}

#[derive(Debug, Deserialize)]
struct OsrmTripResponse {
    code: String,
    message: Option<String>,
    waypoints: Option<Vec<OsrmWaypoint>>,
    trips: Option<Vec<OsrmTrip>>,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    waypoint_index: usize,
    trips_index: usize,
}

#[derive(Debug, Deserialize)]
struct OsrmTrip {
    distance: f64,
    duration: f64,
    geometry: Option<Polyline>,
}
