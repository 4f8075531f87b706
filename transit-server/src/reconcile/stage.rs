//! Staging of trip updates across snapshots.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::realtime::{StopTimeUpdate, TripUpdate};

use super::request::FinalUpdatesRequest;

/// A stop-time update and when the snapshot carrying it was taken.
struct Observed {
    update: StopTimeUpdate,
    observed_at: DateTime<Utc>,
}

/// One trip instance seen in the window.
struct StagedTrip {
    /// Most recently observed update for the trip; its stop-time updates are
    /// replaced on output.
    header: TripUpdate,
    header_observed_at: DateTime<Utc>,
    stops: HashMap<String, Observed>,
}

/// Stop key for an update: its stop id, or its sequence when the id is absent.
fn stop_key(update: &StopTimeUpdate) -> Option<String> {
    match (&update.stop_id, update.stop_sequence) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(seq)) => Some(format!("seq:{seq}")),
        (None, None) => None,
    }
}

/// Reconciled trip updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalUpdates {
    pub trip_updates: Vec<TripUpdate>,
}

impl FinalUpdates {
    pub fn is_empty(&self) -> bool {
        self.trip_updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.trip_updates.len()
    }
}

/// Accumulates the latest observation per (trip instance, stop).
///
/// Trips are keyed by (start date, trip id) and kept in that order.
#[derive(Default)]
pub struct Stage {
    trips: BTreeMap<(String, String), StagedTrip>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one snapshot's trip update into the stage.
    ///
    /// Observations older than what is already staged are ignored, so folding
    /// in chronological order leaves the latest value per stop.
    pub fn observe(
        &mut self,
        update: &TripUpdate,
        observed_at: DateTime<Utc>,
        request: &FinalUpdatesRequest,
    ) {
        let trip = &update.trip;
        if !request.allows_trip(trip.trip_id.as_deref())
            || !request.allows_route(trip.route_id.as_deref())
        {
            return;
        }

        let key = (
            trip.start_date.clone().unwrap_or_default(),
            trip.trip_id.clone().unwrap_or_default(),
        );
        let staged = self.trips.entry(key).or_insert_with(|| StagedTrip {
            header: update.clone(),
            header_observed_at: observed_at,
            stops: HashMap::new(),
        });
        if observed_at >= staged.header_observed_at {
            staged.header = update.clone();
            staged.header_observed_at = observed_at;
        }

        for stu in &update.stop_time_updates {
            if !request.allows_stop(stu.stop_id.as_deref()) {
                continue;
            }
            let Some(stop) = stop_key(stu) else {
                continue;
            };
            let newer = staged
                .stops
                .get(&stop)
                .is_none_or(|existing| observed_at >= existing.observed_at);
            if newer {
                staged.stops.insert(
                    stop,
                    Observed {
                        update: stu.clone(),
                        observed_at,
                    },
                );
            }
        }
    }

    /// Number of staged trip instances.
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Keep only updates whose predicted instant is at least `wait` before
    /// `end`, and emit trips that kept any.
    pub fn finish(self, end: DateTime<Utc>, wait: Duration) -> FinalUpdates {
        let mut trip_updates = Vec::new();

        for (_, staged) in self.trips {
            let mut latest = staged.header.timestamp;
            let mut retained: Vec<StopTimeUpdate> = Vec::new();

            for observed in staged.stops.into_values() {
                let Some(predicted) = observed.update.prediction_time() else {
                    continue;
                };
                if end - predicted < wait {
                    continue;
                }
                if let Ok(secs) = u64::try_from(predicted.timestamp()) {
                    latest = Some(latest.map_or(secs, |t| t.max(secs)));
                }
                retained.push(observed.update);
            }

            if retained.is_empty() {
                continue;
            }
            retained.sort_by_key(|u| u.stop_sequence);

            let mut trip_update = staged.header;
            trip_update.stop_time_updates = retained;
            trip_update.timestamp = latest;
            trip_updates.push(trip_update);
        }

        FinalUpdates { trip_updates }
    }
}
