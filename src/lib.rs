//! route-sequencer
//!
//! Orders multi-stop delivery routes under positional constraints (origin
//! first, optional urgent stop second, optional destination last), by local
//! heuristics, an external trip backend, or a text oracle when coordinates
//! are missing.

pub mod error;
pub mod model;
pub mod traits;
pub mod haversine;
pub mod solver;
pub mod segment;
pub mod polyline;
pub mod trip;
pub mod osrm;
pub mod osrm_data;
pub mod fallback;
pub mod gemini;
pub mod geocode;
pub mod planner;

pub use error::{Error, ErrorResponse, Result};
pub use model::{Coordinates, Delivery, Role, RouteRequest, RouteResponse, Stop};
pub use planner::{CancelToken, Planner, PlannerOptions};
