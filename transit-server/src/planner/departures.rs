//! Stop departures: scheduled calls merged with live estimates.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::live::LiveFeedCache;
use crate::realtime::{StopTimeUpdate, VehiclePosition};
use crate::schedule::{Route, ScheduleIndex, Stop, StopTime, Trip};

use super::config::{DepartureOrder, PlannerConfig};

/// One upcoming departure from a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    pub route: Arc<Route>,
    pub trip: Arc<Trip>,
    pub stop_time: Arc<StopTime>,
    pub stop_time_update: Option<StopTimeUpdate>,
    pub vehicle_position: Option<VehiclePosition>,
    /// The service day the trip runs under.
    pub service_date: NaiveDate,
    /// Absolute scheduled departure.
    pub scheduled_departure: DateTime<Utc>,
    /// Live estimate if there is one, otherwise the scheduled departure.
    pub departure_time: DateTime<Utc>,
    /// Whether `departure_time` comes from the live feed.
    pub estimated: bool,
}

/// A scheduled call that falls inside the window.
struct Candidate<'s> {
    stop_time: &'s Arc<StopTime>,
    service_date: NaiveDate,
    scheduled: DateTime<Utc>,
}

/// Departure planner over a schedule and the live feed.
pub struct DeparturePlanner<'a> {
    schedule: &'a ScheduleIndex,
    feed: &'a LiveFeedCache,
    config: &'a PlannerConfig,
}

impl<'a> DeparturePlanner<'a> {
    /// Create a new planner.
    pub fn new(
        schedule: &'a ScheduleIndex,
        feed: &'a LiveFeedCache,
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            schedule,
            feed,
            config,
        }
    }

    /// Departures from `stop` around `target`.
    ///
    /// Trips running under both the target's service day and the previous
    /// one are considered, so calls scheduled past 24:00 on yesterday's
    /// service show up. A call is kept if its scheduled departure lies
    /// strictly inside `(target - lookback, target + lookahead)`.
    ///
    /// The live feed is read once, so the result is consistent with a single
    /// published snapshot.
    ///
    /// A matching live stop update is always attached, but `estimated` is set
    /// only when a live instant can be derived from it: a departure time, an
    /// arrival time, or a delay. An update carrying none of these leaves the
    /// departure unestimated at its scheduled time.
    pub fn departures_for_stop(&self, stop: &Stop, target: DateTime<Utc>) -> Vec<Departure> {
        let tz = self.schedule.timezone();
        let today = target.with_timezone(&tz).date_naive();
        let window_start = target - self.config.lookback();
        let window_end = target + self.config.lookahead();

        let mut service_dates = vec![today];
        if let Some(yesterday) = today.pred_opt() {
            service_dates.push(yesterday);
        }
        let days: Vec<(NaiveDate, DateTime<Utc>, HashSet<String>)> = service_dates
            .into_iter()
            .map(|date| {
                let services = self.schedule.active_services_for_date(date);
                let trips = self.schedule.trip_ids_for_service_ids(&services);
                (date, self.schedule.service_day_anchor(date), trips)
            })
            .collect();

        let mut candidates = Vec::new();
        for stop_time in self.schedule.stop_times_for_stop(&stop.id) {
            for (date, anchor, trips) in &days {
                if !trips.contains(&stop_time.trip_id) {
                    continue;
                }
                let scheduled = *anchor + stop_time.departure_time;
                if scheduled > window_start && scheduled < window_end {
                    candidates.push(Candidate {
                        stop_time,
                        service_date: *date,
                        scheduled,
                    });
                }
            }
        }
        candidates.sort_by_key(|c| c.scheduled);

        let trip_updates = self.feed.current_trip_updates();
        let vehicle_positions = self.feed.current_vehicle_positions();

        let mut departures: Vec<Departure> = candidates
            .into_iter()
            .filter_map(|c| {
                let trip = self.schedule.trip(&c.stop_time.trip_id)?;
                let route = self.schedule.route(&trip.route_id)?;
                let stop_time_update = trip_updates
                    .stop_time_update(&trip.id, &stop.id)
                    .cloned();
                let vehicle_position = vehicle_positions.vehicle_position(&trip.id).cloned();
                let estimate = stop_time_update
                    .as_ref()
                    .and_then(|u| live_departure(u, c.scheduled));

                Some(Departure {
                    route: Arc::clone(route),
                    trip: Arc::clone(trip),
                    stop_time: Arc::clone(c.stop_time),
                    stop_time_update,
                    vehicle_position,
                    service_date: c.service_date,
                    scheduled_departure: c.scheduled,
                    departure_time: estimate.unwrap_or(c.scheduled),
                    estimated: estimate.is_some(),
                })
            })
            .collect();

        if self.config.order == DepartureOrder::Effective {
            departures.sort_by_key(|d| d.departure_time);
        }

        departures
    }
}

/// Live departure instant for a stop update.
///
/// Prefers an absolute departure time, then an absolute arrival time, then a
/// delay applied to the scheduled departure.
fn live_departure(update: &StopTimeUpdate, scheduled: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(t) = update.prediction_time() {
        return Some(t);
    }
    update
        .departure
        .and_then(|e| e.delay)
        .or_else(|| update.arrival.and_then(|e| e.delay))
        .map(|delay| scheduled + Duration::seconds(i64::from(delay)))
}
