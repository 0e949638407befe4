//! Test fixtures for route-sequencer.
//!
//! Provides:
//! - Real Las Vegas / Henderson locations
//! - Mock trip backend, ordering oracle and address resolver

#![allow(dead_code)]

pub mod las_vegas_locations;

use std::collections::HashMap;
use std::sync::Mutex;

use route_sequencer::haversine::haversine_m;
use route_sequencer::polyline::Polyline;
use route_sequencer::traits::{
    CoordinateResolver, OrderingOracle, TripOptimizer, TripPlan, TripWaypoint,
};
use route_sequencer::{CancelToken, Coordinates, Error, Result};

pub use las_vegas_locations::*;

// ============================================================================
// Trip backend
// ============================================================================

/// Trip backend that orders the inner points greedily and echoes its
/// waypoints back-to-front, so correlation by array position would break.
#[derive(Default)]
pub struct MockTrip {
    calls: Mutex<Vec<usize>>,
    fail: bool,
    cancel_on_call: Option<CancelToken>,
}

impl MockTrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with an upstream error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Cancels `token` while serving the first call.
    pub fn cancelling(token: CancelToken) -> Self {
        Self {
            cancel_on_call: Some(token),
            ..Self::default()
        }
    }

    /// Cancels `token` and then fails, as if the request was dropped mid-call.
    pub fn cancelling_then_failing(token: CancelToken) -> Self {
        Self {
            fail: true,
            cancel_on_call: Some(token),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Batch sizes seen, in arrival order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl TripOptimizer for MockTrip {
    fn optimize_trip(&self, locations: &[Coordinates], _profile: &str) -> Result<TripPlan> {
        self.calls.lock().unwrap().push(locations.len());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        if self.fail {
            return Err(Error::Upstream {
                status: 503,
                message: "trip service unavailable".to_string(),
            });
        }

        let n = locations.len();
        let mut visit = vec![0];
        let mut remaining: Vec<usize> = (1..n.saturating_sub(1)).collect();
        while !remaining.is_empty() {
            let current = locations[*visit.last().unwrap()];
            let (k, _) = remaining
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    haversine_m(current, locations[*a.1])
                        .total_cmp(&haversine_m(current, locations[*b.1]))
                })
                .unwrap();
            visit.push(remaining.remove(k));
        }
        if n > 1 {
            visit.push(n - 1);
        }

        let mut waypoints: Vec<TripWaypoint> = visit
            .iter()
            .enumerate()
            .map(|(trip_position, &input_index)| TripWaypoint {
                input_index,
                trip_position,
            })
            .collect();
        waypoints.reverse();

        let distance = visit
            .windows(2)
            .map(|leg| haversine_m(locations[leg[0]], locations[leg[1]]))
            .sum::<f64>();

        Ok(TripPlan {
            waypoints,
            distance,
            duration: distance / 10.0,
            geometry: Some(Polyline::new(
                visit.iter().map(|&i| locations[i].as_tuple()).collect(),
            )),
        })
    }
}

// ============================================================================
// Ordering oracle
// ============================================================================

/// Oracle that always answers with the same text.
pub struct ScriptedOracle {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl OrderingOracle for ScriptedOracle {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

// ============================================================================
// Address resolver
// ============================================================================

/// Resolver backed by a fixed address table.
#[derive(Default)]
pub struct TableResolver {
    table: HashMap<String, (f64, f64)>,
    lookups: Mutex<usize>,
}

impl TableResolver {
    pub fn with(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.table.insert(address.to_string(), (lat, lng));
        self
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

impl CoordinateResolver for TableResolver {
    fn resolve(&self, address: &str) -> Result<Option<Coordinates>> {
        *self.lookups.lock().unwrap() += 1;
        self.table
            .get(address)
            .map(|&(lat, lng)| Coordinates::new(lat, lng))
            .transpose()
    }
}
