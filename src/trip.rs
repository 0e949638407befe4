//! Trip optimization client.
//!
//! Sends bounded batches of points to a [`TripOptimizer`] and maps the
//! answer back onto stop identities using the backend's positional tags.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::Coordinates;
use crate::planner::CancelToken;
use crate::polyline::Polyline;
use crate::traits::{TripOptimizer, TripPlan};

/// Default cap on points per trip request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 12;

/// A point to send, tagged with the identity of its stop.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPoint {
    pub id: String,
    pub coordinates: Coordinates,
}

/// A correlated trip: ids in visiting order plus leg metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TripLeg {
    pub order: Vec<String>,
    pub distance: f64,
    pub duration: f64,
    pub geometry: Option<Polyline>,
}

pub struct TripClient<'a> {
    optimizer: &'a dyn TripOptimizer,
    max_batch_size: usize,
    cancel: CancelToken,
}

impl<'a> TripClient<'a> {
    pub fn new(optimizer: &'a dyn TripOptimizer, max_batch_size: usize) -> Self {
        Self {
            optimizer,
            max_batch_size,
            cancel: CancelToken::new(),
        }
    }

    /// Aborts between attempts once `cancel` fires.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Optimizes the points between a fixed first and a fixed last point.
    ///
    /// Oversized batches are rejected before any call. A failed call is
    /// retried once; a second failure aborts with
    /// [`Error::RemoteOptimization`]. A cancelled request fails with
    /// [`Error::Cancelled`] and is never retried.
    pub fn optimize(&self, points: &[TripPoint], profile: &str) -> Result<TripLeg> {
        if points.len() < 2 {
            return Err(Error::validation("a trip needs at least 2 points"));
        }
        if points.len() > self.max_batch_size {
            return Err(Error::validation(format!(
                "trip batch of {} points exceeds the limit of {}",
                points.len(),
                self.max_batch_size
            )));
        }

        let locations: Vec<Coordinates> = points.iter().map(|p| p.coordinates).collect();

        let mut last_error = String::new();
        for attempt in 1..=2u32 {
            self.cancel.check()?;
            let outcome = self
                .optimizer
                .optimize_trip(&locations, profile)
                .and_then(|plan| correlate(points, plan));

            match outcome {
                Ok(leg) => {
                    debug!(points = points.len(), attempt, distance = leg.distance, "trip optimized");
                    return Ok(leg);
                }
                Err(err) => {
                    self.cancel.check()?;
                    warn!(attempt, error = %err, "trip optimization attempt failed");
                    last_error = err.to_string();
                }
            }
        }

        Err(Error::RemoteOptimization {
            attempts: 2,
            reason: last_error,
        })
    }
}

/// Maps tagged waypoints back to point ids.
///
/// Rejects plans whose tags are not a permutation of the request or that
/// moved the fixed endpoints.
fn correlate(points: &[TripPoint], plan: TripPlan) -> Result<TripLeg> {
    let n = points.len();
    if plan.waypoints.len() != n {
        return Err(Error::malformed(format!(
            "expected {} waypoints, got {}",
            n,
            plan.waypoints.len()
        )));
    }

    let mut slots: Vec<Option<&str>> = vec![None; n];
    for waypoint in &plan.waypoints {
        let point = points.get(waypoint.input_index).ok_or_else(|| {
            Error::malformed(format!("unknown input index {}", waypoint.input_index))
        })?;
        let slot = slots.get_mut(waypoint.trip_position).ok_or_else(|| {
            Error::malformed(format!("trip position {} out of range", waypoint.trip_position))
        })?;
        if slot.replace(point.id.as_str()).is_some() {
            return Err(Error::malformed(format!(
                "trip position {} assigned twice",
                waypoint.trip_position
            )));
        }
    }

    // Every slot is filled: n distinct positions were assigned.
    let order: Vec<String> = slots.into_iter().flatten().map(str::to_string).collect();

    let mut seen: Vec<&str> = order.iter().map(String::as_str).collect();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != n {
        return Err(Error::malformed("input index echoed twice"));
    }

    if order.first() != Some(&points[0].id) || order.last() != Some(&points[n - 1].id) {
        return Err(Error::malformed("trip endpoints were not kept fixed"));
    }
    if !(plan.distance.is_finite() && plan.distance >= 0.0)
        || !(plan.duration.is_finite() && plan.duration >= 0.0)
    {
        return Err(Error::malformed("negative or non-finite trip metrics"));
    }

    Ok(TripLeg {
        order,
        distance: plan.distance,
        duration: plan.duration,
        geometry: plan.geometry,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::traits::TripWaypoint;

    fn point(id: &str, lat: f64, lng: f64) -> TripPoint {
        TripPoint {
            id: id.to_string(),
            coordinates: Coordinates::new(lat, lng).unwrap(),
        }
    }

    /// Replays canned outcomes and counts calls.
    struct Scripted {
        outcomes: Mutex<Vec<Result<TripPlan>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<TripPlan>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl TripOptimizer for Scripted {
        fn optimize_trip(&self, _locations: &[Coordinates], _profile: &str) -> Result<TripPlan> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    fn plan(tags: &[(usize, usize)]) -> TripPlan {
        TripPlan {
            waypoints: tags
                .iter()
                .map(|&(input_index, trip_position)| TripWaypoint {
                    input_index,
                    trip_position,
                })
                .collect(),
            distance: 1500.0,
            duration: 300.0,
            geometry: None,
        }
    }

    #[test]
    fn test_correlates_by_tag_not_array_position() {
        let points = vec![
            point("origin", 0.0, 0.0),
            point("far", 0.0, 0.2),
            point("near", 0.0, 0.1),
            point("end", 0.0, 0.3),
        ];
        // Entries arrive shuffled; tags say near is visited before far.
        let optimizer = Scripted::new(vec![Ok(plan(&[(3, 3), (1, 2), (0, 0), (2, 1)]))]);
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE);

        let leg = client.optimize(&points, "driving").unwrap();
        assert_eq!(leg.order, vec!["origin", "near", "far", "end"]);
        assert_eq!(leg.distance, 1500.0);
        assert_eq!(leg.duration, 300.0);
    }

    #[test]
    fn test_rejects_oversized_batch_without_calling() {
        let points: Vec<TripPoint> = (0..13)
            .map(|k| point(&format!("p{k}"), 0.0, k as f64 / 100.0))
            .collect();
        let optimizer = Scripted::new(Vec::new());
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE);

        let err = client.optimize(&points, "driving").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(optimizer.calls(), 0);
    }

    #[test]
    fn test_retries_once_then_succeeds() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1)];
        let optimizer = Scripted::new(vec![
            Err(Error::Upstream {
                status: 503,
                message: "busy".to_string(),
            }),
            Ok(plan(&[(0, 0), (1, 1)])),
        ]);
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE);

        let leg = client.optimize(&points, "driving").unwrap();
        assert_eq!(leg.order, vec!["a", "b"]);
        assert_eq!(optimizer.calls(), 2);
    }

    #[test]
    fn test_gives_up_after_one_retry() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1)];
        let optimizer = Scripted::new(vec![
            Err(Error::malformed("garbage")),
            Err(Error::malformed("still garbage")),
            Ok(plan(&[(0, 0), (1, 1)])),
        ]);
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE);

        let err = client.optimize(&points, "driving").unwrap_err();
        assert!(matches!(err, Error::RemoteOptimization { attempts: 2, .. }));
        assert!(err.to_string().contains("still garbage"));
        assert_eq!(optimizer.calls(), 2);
    }

    #[test]
    fn test_cancelled_token_skips_the_call() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1)];
        let optimizer = Scripted::new(Vec::new());
        let token = CancelToken::new();
        token.cancel();
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE).with_cancel_token(token);

        assert!(matches!(client.optimize(&points, "driving"), Err(Error::Cancelled)));
        assert_eq!(optimizer.calls(), 0);
    }

    /// Cancels the shared token, then fails like a busy backend.
    struct CancelThenFail {
        token: CancelToken,
        calls: Mutex<usize>,
    }

    impl TripOptimizer for CancelThenFail {
        fn optimize_trip(&self, _locations: &[Coordinates], _profile: &str) -> Result<TripPlan> {
            *self.calls.lock().unwrap() += 1;
            self.token.cancel();
            Err(Error::Upstream {
                status: 503,
                message: "busy".to_string(),
            })
        }
    }

    #[test]
    fn test_cancel_during_failed_attempt_is_not_retried() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1)];
        let token = CancelToken::new();
        let optimizer = CancelThenFail {
            token: token.clone(),
            calls: Mutex::new(0),
        };
        let client = TripClient::new(&optimizer, DEFAULT_MAX_BATCH_SIZE).with_cancel_token(token);

        let err = client.optimize(&points, "driving").unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(*optimizer.calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_positions_are_malformed() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1), point("c", 0.0, 0.2)];
        let err = correlate(&points, plan(&[(0, 0), (1, 1), (2, 1)])).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_duplicate_inputs_are_malformed() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1), point("c", 0.0, 0.2)];
        assert!(correlate(&points, plan(&[(0, 0), (1, 1), (1, 2)])).is_err());
    }

    #[test]
    fn test_moved_endpoints_are_malformed() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.1), point("c", 0.0, 0.2)];
        assert!(correlate(&points, plan(&[(0, 1), (1, 0), (2, 2)])).is_err());
    }
}
