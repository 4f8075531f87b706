//! Immutable lookup index over a loaded static schedule.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::domain::service_day_anchor;

use super::calendar::active_services;
use super::error::{LoadError, ScheduleError};
use super::records::{Agency, Calendar, CalendarDate, Route, ScheduleRecords, Stop, StopTime, Trip};

/// Read-only index over a static GTFS schedule.
///
/// Built once at startup and shared behind an `Arc`. Nothing here mutates
/// after [`ScheduleIndex::build`] returns, so concurrent readers need no
/// synchronization.
#[derive(Debug)]
pub struct ScheduleIndex {
    timezone: Tz,
    agencies: Vec<Agency>,
    stops: HashMap<String, Arc<Stop>>,
    routes: HashMap<String, Arc<Route>>,
    trips: HashMap<String, Arc<Trip>>,
    calendars: BTreeMap<String, Calendar>,
    calendar_dates: HashMap<NaiveDate, Vec<CalendarDate>>,
    stop_times_by_stop: HashMap<String, Vec<Arc<StopTime>>>,
    stop_times_by_trip: HashMap<String, Vec<Arc<StopTime>>>,
    trips_by_service: HashMap<String, Vec<String>>,
    trips_by_route: HashMap<String, Vec<String>>,
}

impl ScheduleIndex {
    /// Validate the records and build the index.
    ///
    /// Fails if there is no agency, if agencies disagree on timezone, if any
    /// foreign key dangles, or if stop sequences within a trip repeat.
    pub fn build(records: ScheduleRecords) -> Result<Self, LoadError> {
        let timezone = resolve_timezone(&records.agencies)?;

        let stops: HashMap<String, Arc<Stop>> = records
            .stops
            .into_iter()
            .map(|s| (s.id.clone(), Arc::new(s)))
            .collect();
        let routes: HashMap<String, Arc<Route>> = records
            .routes
            .into_iter()
            .map(|r| (r.id.clone(), Arc::new(r)))
            .collect();

        let mut trips = HashMap::with_capacity(records.trips.len());
        let mut trips_by_service: HashMap<String, Vec<String>> = HashMap::new();
        let mut trips_by_route: HashMap<String, Vec<String>> = HashMap::new();
        for trip in records.trips {
            if !routes.contains_key(&trip.route_id) {
                return Err(LoadError::DanglingReference {
                    entity: "trip",
                    id: trip.id,
                    target: "route",
                    target_id: trip.route_id,
                });
            }
            trips_by_service
                .entry(trip.service_id.clone())
                .or_default()
                .push(trip.id.clone());
            trips_by_route
                .entry(trip.route_id.clone())
                .or_default()
                .push(trip.id.clone());
            trips.insert(trip.id.clone(), Arc::new(trip));
        }

        let mut stop_times_by_trip: HashMap<String, Vec<Arc<StopTime>>> = HashMap::new();
        for stop_time in records.stop_times {
            if !trips.contains_key(&stop_time.trip_id) {
                return Err(LoadError::DanglingReference {
                    entity: "stop_time",
                    id: format!("{}#{}", stop_time.trip_id, stop_time.stop_sequence),
                    target: "trip",
                    target_id: stop_time.trip_id,
                });
            }
            if !stops.contains_key(&stop_time.stop_id) {
                return Err(LoadError::DanglingReference {
                    entity: "stop_time",
                    id: format!("{}#{}", stop_time.trip_id, stop_time.stop_sequence),
                    target: "stop",
                    target_id: stop_time.stop_id,
                });
            }
            stop_times_by_trip
                .entry(stop_time.trip_id.clone())
                .or_default()
                .push(Arc::new(stop_time));
        }

        let mut stop_times_by_stop: HashMap<String, Vec<Arc<StopTime>>> = HashMap::new();
        for (trip_id, stop_times) in &mut stop_times_by_trip {
            stop_times.sort_by_key(|st| st.stop_sequence);
            if let Some(pair) = stop_times
                .windows(2)
                .find(|w| w[0].stop_sequence >= w[1].stop_sequence)
            {
                return Err(LoadError::StopSequence {
                    trip_id: trip_id.clone(),
                    sequence: pair[1].stop_sequence,
                });
            }
            for st in stop_times.iter() {
                stop_times_by_stop
                    .entry(st.stop_id.clone())
                    .or_default()
                    .push(Arc::clone(st));
            }
        }
        for stop_times in stop_times_by_stop.values_mut() {
            stop_times.sort_by(|a, b| {
                a.departure_time
                    .cmp(&b.departure_time)
                    .then_with(|| a.trip_id.cmp(&b.trip_id))
            });
        }

        let calendars = records
            .calendars
            .into_iter()
            .map(|c| (c.service_id.clone(), c))
            .collect();

        let mut calendar_dates: HashMap<NaiveDate, Vec<CalendarDate>> = HashMap::new();
        for cd in records.calendar_dates {
            calendar_dates.entry(cd.date).or_default().push(cd);
        }

        Ok(Self {
            timezone,
            agencies: records.agencies,
            stops,
            routes,
            trips,
            calendars,
            calendar_dates,
            stop_times_by_stop,
            stop_times_by_trip,
            trips_by_service,
            trips_by_route,
        })
    }

    /// The agency timezone all service days are anchored in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn agencies(&self) -> &[Agency] {
        &self.agencies
    }

    /// Absolute instant of `date`'s service-day start.
    pub fn service_day_anchor(&self, date: NaiveDate) -> DateTime<Utc> {
        service_day_anchor(date, self.timezone)
    }

    /// Service IDs running on `date`, exceptions applied.
    pub fn active_services_for_date(&self, date: NaiveDate) -> HashSet<String> {
        let exceptions = self
            .calendar_dates
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or_default();
        active_services(date, self.calendars.values(), exceptions)
    }

    /// Every trip ID scheduled under any of `service_ids`.
    pub fn trip_ids_for_service_ids(&self, service_ids: &HashSet<String>) -> HashSet<String> {
        service_ids
            .iter()
            .filter_map(|id| self.trips_by_service.get(id))
            .flatten()
            .cloned()
            .collect()
    }

    /// Trip IDs on a route, empty if the route is unknown.
    pub fn trip_ids_for_route_id(&self, route_id: &str) -> &[String] {
        self.trips_by_route
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The calendar row for a service.
    pub fn calendar_for_service_id(&self, service_id: &str) -> Result<&Calendar, ScheduleError> {
        self.calendars
            .get(service_id)
            .ok_or_else(|| ScheduleError::ServiceNotFound(service_id.to_string()))
    }

    /// All calendar rows, ordered by service ID.
    pub fn calendars(&self) -> impl Iterator<Item = &Calendar> {
        self.calendars.values()
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Arc<Stop>> {
        self.stops.get(stop_id)
    }

    pub fn route(&self, route_id: &str) -> Option<&Arc<Route>> {
        self.routes.get(route_id)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Arc<Trip>> {
        self.trips.get(trip_id)
    }

    /// Scheduled calls at a stop, ordered by departure offset.
    pub fn stop_times_for_stop(&self, stop_id: &str) -> &[Arc<StopTime>] {
        self.stop_times_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// A trip's calls, ordered by stop sequence.
    pub fn stop_times_for_trip(&self, trip_id: &str) -> &[Arc<StopTime>] {
        self.stop_times_by_trip
            .get(trip_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The scheduled call of `trip_id` at `stop_id`.
    ///
    /// A trip that visits the same stop twice yields its first visit.
    pub fn stop_time_for_trip_and_stop(&self, trip_id: &str, stop_id: &str) -> Option<&Arc<StopTime>> {
        self.stop_times_for_trip(trip_id)
            .iter()
            .find(|st| st.stop_id == stop_id)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }
}

/// All agencies must share one parseable timezone.
fn resolve_timezone(agencies: &[Agency]) -> Result<Tz, LoadError> {
    let first = agencies.first().ok_or(LoadError::NoAgency)?;
    if let Some(other) = agencies.iter().find(|a| a.timezone != first.timezone) {
        return Err(LoadError::InconsistentTimezones {
            first: first.timezone.clone(),
            second: other.timezone.clone(),
        });
    }
    first
        .timezone
        .parse::<Tz>()
        .map_err(|_| LoadError::UnknownTimezone(first.timezone.clone()))
}
