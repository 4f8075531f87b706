//! Live feed domain types.
//!
//! These mirror the GTFS-realtime entities the rest of the crate reasons
//! about, with protobuf cardinality noise removed. Conversion to and from the
//! wire form lives in `convert`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::from_posix;

/// The three live feeds an agency publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FeedKind {
    TripUpdates,
    VehiclePositions,
    Alerts,
}

impl FeedKind {
    /// All kinds, in refresh order.
    pub const ALL: [FeedKind; 3] = [
        FeedKind::TripUpdates,
        FeedKind::VehiclePositions,
        FeedKind::Alerts,
    ];

    /// Name used in archive keys and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::TripUpdates => "TripUpdates",
            FeedKind::VehiclePositions => "VehiclePositions",
            FeedKind::Alerts => "Alerts",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a feed kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed kind: {0}")]
pub struct UnknownFeedKind(pub String);

impl FromStr for FeedKind {
    type Err = UnknownFeedKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TripUpdates" => Ok(FeedKind::TripUpdates),
            "VehiclePositions" => Ok(FeedKind::VehiclePositions),
            "Alerts" => Ok(FeedKind::Alerts),
            other => Err(UnknownFeedKind(other.to_string())),
        }
    }
}

/// One decoded live-feed message.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LiveMessage {
    /// POSIX seconds at which the producer created the message.
    pub timestamp: u64,
    pub entities: Vec<FeedEntity>,
}

impl LiveMessage {
    /// A message with no timestamp and no entities.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The header timestamp as an instant, if set.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp == 0 {
            return None;
        }
        i64::try_from(self.timestamp).ok().and_then(from_posix)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn trip_updates(&self) -> impl Iterator<Item = &TripUpdate> {
        self.entities.iter().filter_map(|e| e.trip_update.as_ref())
    }

    pub fn vehicle_positions(&self) -> impl Iterator<Item = &VehiclePosition> {
        self.entities.iter().filter_map(|e| e.vehicle.as_ref())
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.entities.iter().filter_map(|e| e.alert.as_ref())
    }

    /// The live update for `trip_id` at `stop_id`, by linear scan.
    pub fn stop_time_update(&self, trip_id: &str, stop_id: &str) -> Option<&StopTimeUpdate> {
        self.trip_updates()
            .filter(|tu| tu.trip.trip_id.as_deref() == Some(trip_id))
            .flat_map(|tu| tu.stop_time_updates.iter())
            .find(|stu| stu.stop_id.as_deref() == Some(stop_id))
    }

    /// The reported position of the vehicle serving `trip_id`.
    pub fn vehicle_position(&self, trip_id: &str) -> Option<&VehiclePosition> {
        self.vehicle_positions().find(|vp| {
            vp.trip
                .as_ref()
                .is_some_and(|t| t.trip_id.as_deref() == Some(trip_id))
        })
    }
}

/// A feed entity. Normally exactly one payload is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeedEntity {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_update: Option<TripUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehiclePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Reference to one instance of a scheduled trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TripDescriptor {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub direction_id: Option<u32>,
    /// "HH:MM:SS", possibly past 24h.
    pub start_time: Option<String>,
    /// "YYYYMMDD".
    pub start_date: Option<String>,
    pub schedule_relationship: TripRelationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TripRelationship {
    #[default]
    Scheduled,
    Added,
    Unscheduled,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VehicleDescriptor {
    pub id: Option<String>,
    pub label: Option<String>,
    pub license_plate: Option<String>,
}

/// Live predictions for one trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TripUpdate {
    pub trip: TripDescriptor,
    pub vehicle: Option<VehicleDescriptor>,
    pub stop_time_updates: Vec<StopTimeUpdate>,
    /// POSIX seconds of the most recent measurement.
    pub timestamp: Option<u64>,
    pub delay: Option<i32>,
}

/// Predicted (or observed) timing for one event at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StopTimeEvent {
    pub delay: Option<i32>,
    /// POSIX seconds.
    pub time: Option<i64>,
    pub uncertainty: Option<i32>,
}

impl StopTimeEvent {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.time.and_then(from_posix)
    }
}

/// Live prediction for one stop of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StopTimeUpdate {
    pub stop_sequence: Option<u32>,
    pub stop_id: Option<String>,
    pub arrival: Option<StopTimeEvent>,
    pub departure: Option<StopTimeEvent>,
    pub schedule_relationship: StopRelationship,
}

impl StopTimeUpdate {
    /// The instant this update predicts: departure if present, else arrival.
    pub fn prediction_time(&self) -> Option<DateTime<Utc>> {
        self.departure
            .and_then(|e| e.instant())
            .or_else(|| self.arrival.and_then(|e| e.instant()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StopRelationship {
    #[default]
    Scheduled,
    Skipped,
    NoData,
    Unscheduled,
}

/// A vehicle's reported position.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VehiclePosition {
    pub trip: Option<TripDescriptor>,
    pub vehicle: Option<VehicleDescriptor>,
    pub position: Option<Position>,
    pub current_stop_sequence: Option<u32>,
    pub stop_id: Option<String>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub latitude: f32,
    pub longitude: f32,
    pub bearing: Option<f32>,
    pub speed: Option<f32>,
}

/// A service alert. Only the parts the server exposes are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Alert {
    pub header_text: Option<String>,
    pub description_text: Option<String>,
    pub url: Option<String>,
    pub informed_entities: Vec<InformedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InformedEntity {
    pub agency_id: Option<String>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
}
