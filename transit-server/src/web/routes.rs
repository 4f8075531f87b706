//! HTTP route handlers.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::archive::{Snapshot, SnapshotArchive};
use crate::planner::DeparturePlanner;
use crate::realtime::FeedKind;
use crate::reconcile::{FinalUpdates, FinalUpdatesRequest, SnapshotReconciler};
use crate::schedule::Calendar;

use super::dto::*;
use super::error::AppError;
use super::export::final_updates_csv;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendar", get(list_calendars))
        .route("/calendar/:service_id", get(calendar_for_service))
        .route("/routes/:route_id/positions", get(route_positions))
        .route("/routes/:route_id/updates", get(route_updates))
        .route("/stops/:stop_id/departures", get(stop_departures))
        .route("/history/:kind", get(history))
        .route("/final-updates", get(final_updates))
        .route("/final-updates.csv", get(final_updates_as_csv))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

/// Every calendar row.
async fn list_calendars(State(state): State<AppState>) -> Json<Vec<Calendar>> {
    Json(state.schedule.calendars().cloned().collect())
}

/// One calendar row by service id.
async fn calendar_for_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<Json<Calendar>, AppError> {
    let calendar = state.schedule.calendar_for_service_id(&service_id)?;
    Ok(Json(calendar.clone()))
}

/// Trip ids scheduled on a route.
fn route_trips<'a>(state: &'a AppState, route_id: &str) -> HashSet<&'a str> {
    state
        .schedule
        .trip_ids_for_route_id(route_id)
        .iter()
        .map(String::as_str)
        .collect()
}

/// Current vehicle positions on a route.
async fn route_positions(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Json<Vec<RouteVehicle>> {
    let trips = route_trips(&state, &route_id);
    let positions = state.feed.current_vehicle_positions();

    let vehicles = positions
        .vehicle_positions()
        .filter_map(|vp| {
            let trip_id = vp.trip.as_ref()?.trip_id.as_deref()?;
            if !trips.contains(trip_id) {
                return None;
            }
            let trip = state.schedule.trip(trip_id)?;
            Some(RouteVehicle {
                trip: Arc::clone(trip),
                vehicle_position: vp.clone(),
            })
        })
        .collect();

    Json(vehicles)
}

/// Current trip updates on a route.
async fn route_updates(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Json<Vec<RouteTripUpdate>> {
    let trips = route_trips(&state, &route_id);
    let updates = state.feed.current_trip_updates();

    let trip_updates = updates
        .trip_updates()
        .filter_map(|tu| {
            let trip_id = tu.trip.trip_id.as_deref()?;
            if !trips.contains(trip_id) {
                return None;
            }
            let trip = state.schedule.trip(trip_id)?;
            Some(RouteTripUpdate {
                trip: Arc::clone(trip),
                trip_update: tu.clone(),
            })
        })
        .collect();

    Json(trip_updates)
}

/// Upcoming departures from a stop.
async fn stop_departures(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<DeparturesQuery>,
) -> Result<Json<StopDeparturesResponse>, AppError> {
    let stop = state
        .schedule
        .stop(&stop_id)
        .ok_or_else(|| AppError::not_found("stop not found"))?;

    let target = match query.target_time.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => parse_rfc3339(raw)
            .map_err(|e| AppError::bad_request(format!("time parse error: {e}")))?,
        None => Utc::now(),
    };

    let planner = DeparturePlanner::new(&state.schedule, &state.feed, &state.planner);
    let departures = planner.departures_for_stop(stop, target);

    Ok(Json(StopDeparturesResponse {
        stop: Arc::clone(stop),
        departures,
    }))
}

/// The archived snapshot of a feed kind for a minute.
async fn history(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Snapshot>, AppError> {
    let kind: FeedKind = kind
        .parse()
        .map_err(|e: crate::realtime::UnknownFeedKind| AppError::bad_request(e.to_string()))?;

    let raw = query
        .ts
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("need ts"))?;
    let ts =
        parse_rfc3339(raw).map_err(|e| AppError::bad_request(format!("ts parse error: {e}")))?;

    let snapshot = state.archive.get_as_of(kind, ts).await?;
    Ok(Json(snapshot))
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn all_params(params: &[(String, String)], name: &str) -> Vec<String> {
    params
        .iter()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Build a reconciliation request from query parameters.
///
/// `startTime` and `endTime` are required RFC 3339 instants; `tripID`,
/// `routeID` and `stopID` may repeat.
fn final_updates_request(params: &[(String, String)]) -> Result<FinalUpdatesRequest, AppError> {
    let (Some(start), Some(end)) = (first_param(params, "startTime"), first_param(params, "endTime"))
    else {
        return Err(AppError::bad_request("need startTime and endTime"));
    };

    let start = parse_rfc3339(start)
        .map_err(|e| AppError::bad_request(format!("startTime parse error: {e}")))?;
    let end = parse_rfc3339(end)
        .map_err(|e| AppError::bad_request(format!("endTime parse error: {e}")))?;

    Ok(FinalUpdatesRequest::new(start, end)
        .with_trip_ids(all_params(params, "tripID"))
        .with_route_ids(all_params(params, "routeID"))
        .with_stop_ids(all_params(params, "stopID")))
}

async fn reconcile(state: &AppState, params: &[(String, String)]) -> Result<FinalUpdates, AppError> {
    let request = final_updates_request(params)?;
    let reconciler = SnapshotReconciler::new(state.archive.as_ref(), &state.reconcile);
    Ok(reconciler.reconcile_final_updates(&request).await?)
}

/// Stabilized trip updates over a past window.
async fn final_updates(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FinalUpdates>, AppError> {
    Ok(Json(reconcile(&state, &params).await?))
}

/// Stabilized trip updates as CSV.
async fn final_updates_as_csv(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let updates = reconcile(&state, &params).await?;
    let body = final_updates_csv(&state.schedule, &updates)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], body).into_response())
}
