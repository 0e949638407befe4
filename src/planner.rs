//! Route sequencing orchestrator.
//!
//! A request moves through `Validating`, optionally `Resolving`, then either
//! the coordinate path (`Segmenting`, `Ordering`, `Merging`) or
//! `FallbackOrdering`, and ends in `Done` or `Failed`. Nothing is kept
//! between requests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fallback;
use crate::haversine::{HaversineMatrix, distance};
use crate::model::{Coordinates, RouteRequest, RouteResponse, Stop, is_plain_profile};
use crate::polyline::Polyline;
use crate::segment::{self, Anchors, Segment};
use crate::solver::{self, SolveOptions};
use crate::traits::{CoordinateResolver, DistanceMatrixProvider, OrderingOracle, TripOptimizer};
use crate::trip::{DEFAULT_MAX_BATCH_SIZE, TripClient, TripLeg, TripPoint};

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Most points sent in one trip request.
    pub max_batch_size: usize,
    /// Maximum full 2-opt passes per segment.
    pub local_search_iterations: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            local_search_iterations: SolveOptions::default().local_search_iterations,
        }
    }
}

/// Shared flag for aborting a request from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Validating,
    Resolving,
    Segmenting,
    Ordering,
    Merging,
    FallbackOrdering,
    Done,
    Failed,
}

fn enter(state: PlanState) {
    debug!(?state, "planner state");
}

/// Ordered stop indices plus aggregate metrics.
struct Sequenced {
    order: Vec<usize>,
    distance: f64,
    duration: Option<f64>,
    geometry: Option<Polyline>,
    warnings: Vec<String>,
}

pub struct Planner<'a> {
    trip: Option<&'a dyn TripOptimizer>,
    oracle: Option<&'a dyn OrderingOracle>,
    resolver: Option<&'a dyn CoordinateResolver>,
    options: PlannerOptions,
    cancel: CancelToken,
}

impl<'a> Planner<'a> {
    /// A planner that orders by local heuristics only.
    pub fn new(options: PlannerOptions) -> Self {
        Self {
            trip: None,
            oracle: None,
            resolver: None,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Delegates each segment to a trip backend instead of the local heuristics.
    pub fn with_trip_optimizer(mut self, trip: &'a dyn TripOptimizer) -> Self {
        self.trip = Some(trip);
        self
    }

    pub fn with_oracle(mut self, oracle: &'a dyn OrderingOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Resolves missing coordinates before choosing a path.
    pub fn with_resolver(mut self, resolver: &'a dyn CoordinateResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self, request: &RouteRequest) -> Result<RouteResponse> {
        match self.run(request) {
            Ok(response) => {
                enter(PlanState::Done);
                info!(
                    stops = response.optimized_order.len(),
                    distance_m = response.total_distance,
                    warnings = response.warnings.len(),
                    "route planned"
                );
                Ok(response)
            }
            Err(err) => {
                enter(PlanState::Failed);
                warn!(error = %err, "route planning failed");
                Err(err)
            }
        }
    }

    fn run(&self, request: &RouteRequest) -> Result<RouteResponse> {
        enter(PlanState::Validating);
        let mut stops = validate(request)?;
        if self.options.max_batch_size < 2 {
            return Err(Error::validation("max batch size must be at least 2"));
        }
        let anchors = Anchors::resolve(&stops, request.fix_destination_at_end)?;

        if let Some(resolver) = self.resolver {
            self.resolve_missing(resolver, &mut stops)?;
        }

        let located: Option<Vec<Coordinates>> = stops.iter().map(|s| s.coordinates).collect();
        let sequenced = match located {
            Some(locations) => {
                info!(stops = stops.len(), "planning by coordinates");
                self.sequence_by_coordinates(&stops, &locations, &anchors, &request.profile)?
            }
            None => {
                info!(stops = stops.len(), "coordinates missing; planning through the oracle");
                self.sequence_fallback(&stops, &anchors)?
            }
        };

        Ok(RouteResponse {
            optimized_order: sequenced.order.iter().map(|&i| stops[i].id.clone()).collect(),
            total_distance: sequenced.distance,
            total_duration: sequenced.duration,
            route_geometry: sequenced.geometry,
            warnings: sequenced.warnings,
        })
    }

    fn resolve_missing(&self, resolver: &dyn CoordinateResolver, stops: &mut [Stop]) -> Result<()> {
        for stop in stops.iter_mut().filter(|s| s.coordinates.is_none()) {
            enter(PlanState::Resolving);
            self.cancel.check()?;

            let failure = |reason: String| Error::Geocoding {
                id: stop.id.clone(),
                address: stop.address.clone(),
                reason,
            };
            if stop.address.trim().is_empty() {
                return Err(failure("address is empty".to_string()));
            }

            let resolved = resolver
                .resolve(&stop.address)
                .map_err(|err| failure(err.to_string()))?
                .ok_or_else(|| failure("no match".to_string()))?;
            stop.coordinates = Some(resolved);
        }

        self.cancel.check()
    }

    fn sequence_by_coordinates(
        &self,
        stops: &[Stop],
        locations: &[Coordinates],
        anchors: &Anchors,
        profile: &str,
    ) -> Result<Sequenced> {
        enter(PlanState::Segmenting);
        let segments = segment::segment(stops.len(), anchors)?;
        let matrix = HaversineMatrix.matrix_for(locations);
        let solve_options = SolveOptions {
            local_search_iterations: self.options.local_search_iterations,
        };

        enter(PlanState::Ordering);
        let local_tours: Vec<Vec<usize>> = segments
            .iter()
            .map(|s| solver::order_segment(&matrix, s.lead, &s.free, s.tail, &solve_options))
            .collect();

        let Some(trip) = self.trip else {
            enter(PlanState::Merging);
            let order = segment::merge(&local_tours);
            return Ok(Sequenced {
                distance: solver::tour_cost(&matrix, &order),
                order,
                duration: None,
                geometry: None,
                warnings: Vec::new(),
            });
        };

        let client = TripClient::new(trip, self.options.max_batch_size)
            .with_cancel_token(self.cancel.clone());
        let mut legs: Vec<TripLeg> = Vec::new();
        for (segment, seed) in segments.iter().zip(&local_tours) {
            legs.extend(self.optimize_remotely(&client, segment, seed, stops, locations, profile)?);
        }

        enter(PlanState::Merging);
        let index: HashMap<&str, usize> = stops
            .iter()
            .enumerate()
            .map(|(i, stop)| (stop.id.as_str(), i))
            .collect();
        let tours: Vec<Vec<usize>> = legs
            .iter()
            .map(|leg| leg.order.iter().map(|id| index[id.as_str()]).collect())
            .collect();
        let geometry = legs
            .iter()
            .map(|leg| leg.geometry.clone())
            .collect::<Option<Vec<_>>>()
            .map(Polyline::concat);

        Ok(Sequenced {
            order: segment::merge(&tours),
            distance: legs.iter().map(|leg| leg.distance).sum(),
            duration: Some(legs.iter().map(|leg| leg.duration).sum()),
            geometry,
            warnings: Vec::new(),
        })
    }

    /// Sends one segment to the trip backend.
    ///
    /// The locally ordered `seed` decides the fixed last point when the
    /// segment has no trailing anchor, and the split points when it is too
    /// large for one batch. Batches share their boundary points, so they are
    /// independent and run concurrently; legs come back in seed order.
    fn optimize_remotely(
        &self,
        client: &TripClient<'_>,
        segment: &Segment,
        seed: &[usize],
        stops: &[Stop],
        locations: &[Coordinates],
        profile: &str,
    ) -> Result<Vec<TripLeg>> {
        let batches = split_into_batches(seed, client.max_batch_size());
        debug!(
            points = segment.len(),
            batches = batches.len(),
            "dispatching segment to trip backend"
        );

        let cancel = &self.cancel;
        let legs = batches
            .par_iter()
            .map(|batch| {
                cancel.check()?;
                let points: Vec<TripPoint> = batch
                    .iter()
                    .map(|&i| TripPoint {
                        id: stops[i].id.clone(),
                        coordinates: locations[i],
                    })
                    .collect();
                client.optimize(&points, profile)
            })
            .collect::<Result<Vec<_>>>()?;

        self.cancel.check()?;
        Ok(legs)
    }

    fn sequence_fallback(&self, stops: &[Stop], anchors: &Anchors) -> Result<Sequenced> {
        enter(PlanState::FallbackOrdering);
        self.cancel.check()?;
        let outcome = fallback::sequence(self.oracle, stops, anchors);
        self.cancel.check()?;

        // Legs touching an unlocated stop have no known length.
        let distance: f64 = outcome
            .order
            .windows(2)
            .map(|leg| distance(stops[leg[0]].coordinates, stops[leg[1]].coordinates))
            .filter(|meters| meters.is_finite())
            .sum();

        Ok(Sequenced {
            order: outcome.order,
            distance,
            duration: None,
            geometry: None,
            warnings: outcome.warning.into_iter().collect(),
        })
    }
}

/// Boundary checks on the raw request.
fn validate(request: &RouteRequest) -> Result<Vec<Stop>> {
    if request.deliveries.len() < 2 {
        return Err(Error::validation(format!(
            "at least 2 stops are required, got {}",
            request.deliveries.len()
        )));
    }

    if !is_plain_profile(&request.profile) {
        return Err(Error::validation(format!(
            "profile {:?} must be letters, digits, '-' or '_'",
            request.profile
        )));
    }

    let mut seen = HashSet::new();
    for delivery in &request.deliveries {
        if !seen.insert(delivery.id.as_str()) {
            return Err(Error::validation(format!("duplicate stop id {}", delivery.id)));
        }
    }

    request.deliveries.iter().map(Stop::try_from).collect()
}

/// Splits a tour into overlapping batches of at most `max` points.
///
/// Consecutive batches share one boundary point.
fn split_into_batches(tour: &[usize], max: usize) -> Vec<Vec<usize>> {
    if tour.len() <= max {
        return vec![tour.to_vec()];
    }

    let mut batches = Vec::new();
    let mut start = 0;
    while start + 1 < tour.len() {
        let end = (start + max - 1).min(tour.len() - 1);
        batches.push(tour[start..=end].to_vec());
        start = end;
    }
    batches
}
