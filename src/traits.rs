//! Capability seams of the sequencing engine.
//!
//! Each external collaborator sits behind a small trait so the planner can
//! be driven by HTTP adapters in production and by mocks in tests.

use crate::error::Result;
use crate::model::Coordinates;
use crate::polyline::Polyline;

/// Provides a travel-cost matrix (meters) for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[Coordinates]) -> Vec<Vec<f64>>;
}

/// One echoed input point of a trip plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripWaypoint {
    /// Position of this point in the request that was sent.
    pub input_index: usize,
    /// Position of this point in the optimized trip.
    pub trip_position: usize,
}

/// Raw answer of a trip backend, before correlation with stop identities.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPlan {
    /// Tagged entries in whatever order the backend chose to return them.
    pub waypoints: Vec<TripWaypoint>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
    pub geometry: Option<Polyline>,
}

/// External trip optimization capability.
///
/// The first location is the fixed source and the last one the fixed
/// destination; only the points in between are permuted.
pub trait TripOptimizer: Send + Sync {
    fn optimize_trip(&self, locations: &[Coordinates], profile: &str) -> Result<TripPlan>;
}

/// Free-text reasoning oracle used when geometry is missing.
///
/// Returns the raw text of the oracle's answer; validation happens upstream.
pub trait OrderingOracle {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Address to coordinate resolution.
///
/// `Ok(None)` means the resolver answered but found no match.
pub trait CoordinateResolver {
    fn resolve(&self, address: &str) -> Result<Option<Coordinates>>;
}
