//! Data transfer objects for web requests and responses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::planner::Departure;
use crate::realtime::{TripUpdate, VehiclePosition};
use crate::schedule::{Stop, Trip};

/// Query for stop departures.
#[derive(Debug, Deserialize)]
pub struct DeparturesQuery {
    /// RFC 3339 instant (defaults to now)
    #[serde(rename = "targetTime")]
    pub target_time: Option<String>,
}

/// Response for stop departures.
#[derive(Debug, Serialize)]
pub struct StopDeparturesResponse {
    pub stop: Arc<Stop>,
    pub departures: Vec<Departure>,
}

/// A vehicle on a route, with the static trip it serves.
#[derive(Debug, Serialize)]
pub struct RouteVehicle {
    pub trip: Arc<Trip>,
    pub vehicle_position: VehiclePosition,
}

/// A live trip update on a route, with the static trip.
#[derive(Debug, Serialize)]
pub struct RouteTripUpdate {
    pub trip: Arc<Trip>,
    pub trip_update: TripUpdate,
}

/// Query for a historical snapshot.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// RFC 3339 instant
    pub ts: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
