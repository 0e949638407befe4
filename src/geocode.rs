//! Nominatim adapter for address resolution.
//!
//! The public Nominatim instance allows one request per second and requires
//! an identifying User-Agent; both are enforced here.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Coordinates;
use crate::traits::CoordinateResolver;

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum spacing between two requests.
    pub min_interval_ms: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Debug)]
pub struct NominatimClient {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            config,
            client,
            last_request: Mutex::new(None),
        })
    }

    fn throttle(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let interval = Duration::from_millis(self.config.min_interval_ms);
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl CoordinateResolver for NominatimClient {
    fn resolve(&self, address: &str) -> Result<Option<Coordinates>> {
        self.throttle();

        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        let hits = response.json::<Vec<NominatimHit>>()?;
        let resolved = first_hit(hits)?;
        debug!(address, found = resolved.is_some(), "address resolved");
        Ok(resolved)
    }
}

fn first_hit(hits: Vec<NominatimHit>) -> Result<Option<Coordinates>> {
    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let lat = hit
        .lat
        .parse::<f64>()
        .map_err(|_| Error::malformed(format!("bad latitude {}", hit.lat)))?;
    let lng = hit
        .lon
        .parse::<f64>()
        .map_err(|_| Error::malformed(format!("bad longitude {}", hit.lon)))?;

    Coordinates::new(lat, lng)
        .map(Some)
        .map_err(|err| Error::malformed(err.to_string()))
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}
