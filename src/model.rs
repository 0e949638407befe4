//! Stops, roles and the request/response shapes of the sequencing engine.
//!
//! `Delivery` is the loosely validated wire record; `Stop` is the checked
//! domain record produced from it at the request boundary.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::polyline::Polyline;

/// A validated (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

impl Coordinates {
    /// Rejects NaN, infinities and out-of-range degree values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::validation(format!("latitude {lat} out of range")));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(Error::validation(format!("longitude {lng} out of range")));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Positional role of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Origin,
    #[serde(rename = "stop", alias = "waypoint")]
    Waypoint,
    Destination,
}

/// A stop as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinates: Option<[f64; 2]>,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default)]
    pub is_urgent: bool,
}

impl Delivery {
    pub fn new(id: impl Into<String>, address: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            coordinates: None,
            role,
            is_urgent: false,
        }
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some([lat, lng]);
        self
    }

    pub fn urgent(mut self) -> Self {
        self.is_urgent = true;
        self
    }
}

/// A checked stop. Only constructed through [`Stop::try_from`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub role: Role,
    pub urgent: bool,
}

impl TryFrom<&Delivery> for Stop {
    type Error = Error;

    fn try_from(delivery: &Delivery) -> Result<Self> {
        if delivery.id.trim().is_empty() {
            return Err(Error::validation("stop id must not be empty"));
        }

        let coordinates = delivery
            .coordinates
            .map(|[lat, lng]| Coordinates::new(lat, lng))
            .transpose()
            .map_err(|err| Error::validation(format!("stop {}: {err}", delivery.id)))?;

        Ok(Self {
            id: delivery.id.clone(),
            address: delivery.address.clone(),
            coordinates,
            role: delivery.role,
            // Urgency only means something for intermediate stops.
            urgent: delivery.is_urgent && delivery.role == Role::Waypoint,
        })
    }
}

fn default_fix_destination() -> bool {
    true
}

fn default_profile() -> String {
    "driving".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub deliveries: Vec<Delivery>,
    #[serde(default = "default_fix_destination")]
    pub fix_destination_at_end: bool,
    /// Transport mode, passed through to the trip backend untouched.
    #[serde(default = "default_profile")]
    pub profile: String,
}

/// Profiles travel inside backend URL paths, so only plain names pass.
pub fn is_plain_profile(profile: &str) -> bool {
    !profile.is_empty()
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl RouteRequest {
    pub fn new(deliveries: Vec<Delivery>) -> Self {
        Self {
            deliveries,
            fix_destination_at_end: true,
            profile: default_profile(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub optimized_order: Vec<String>,
    /// Meters.
    pub total_distance: f64,
    /// Seconds; only known when a trip backend produced the route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
    pub route_geometry: Option<Polyline>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
