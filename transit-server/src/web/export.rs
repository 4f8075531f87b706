//! CSV rendering of final trip updates.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::domain::{ServiceTime, TimeError, format_service_date, from_posix, parse_service_date};
use crate::realtime::{StopTimeEvent, TripUpdate};
use crate::reconcile::FinalUpdates;
use crate::schedule::ScheduleIndex;

pub const CSV_HEADER: [&str; 9] = [
    "service_date",
    "trip_id",
    "route_id",
    "vehicle_id",
    "stop_id",
    "sched_arrival",
    "actual_arrival",
    "sched_departure",
    "actual_departure",
];

const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Errors while rendering the CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("trip {trip_id}: bad start date {value:?}: {source}")]
    StartDate {
        trip_id: String,
        value: String,
        source: TimeError,
    },

    #[error("trip {trip_id}: bad start time {value:?}: {source}")]
    StartTime {
        trip_id: String,
        value: String,
        source: TimeError,
    },

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv flush failed: {0}")]
    Flush(String),
}

/// The service day a trip update runs under.
///
/// Trips whose start time is 24:00:00 or later belong to the previous
/// service day. A missing start time means no shift.
fn service_date(update: &TripUpdate) -> Result<NaiveDate, ExportError> {
    let trip = &update.trip;
    let trip_id = trip.trip_id.clone().unwrap_or_default();

    let raw_date = trip.start_date.as_deref().unwrap_or_default();
    let date = parse_service_date(raw_date).map_err(|source| ExportError::StartDate {
        trip_id: trip_id.clone(),
        value: raw_date.to_string(),
        source,
    })?;

    let Some(raw_time) = trip.start_time.as_deref() else {
        return Ok(date);
    };
    let start = ServiceTime::parse_hms(raw_time).map_err(|source| ExportError::StartTime {
        trip_id,
        value: raw_time.to_string(),
        source,
    })?;

    if start.is_past_midnight() {
        Ok(date.pred_opt().unwrap_or(date))
    } else {
        Ok(date)
    }
}

fn local_clock(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(CLOCK_FORMAT).to_string()
}

fn actual(event: Option<StopTimeEvent>, tz: Tz) -> String {
    event
        .and_then(|e| e.time)
        .filter(|t| *t > 0)
        .and_then(from_posix)
        .map(|t| local_clock(t, tz))
        .unwrap_or_default()
}

/// Render reconciled updates as CSV, one row per retained stop-time update.
///
/// Scheduled times come from the static schedule for the trip at that stop
/// and are blank when the schedule has no such call.
pub fn final_updates_csv(
    schedule: &ScheduleIndex,
    updates: &FinalUpdates,
) -> Result<Vec<u8>, ExportError> {
    let tz = schedule.timezone();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for update in &updates.trip_updates {
        let date = service_date(update)?;
        let anchor = schedule.service_day_anchor(date);
        let service_date = format_service_date(date);

        let trip_id = update.trip.trip_id.as_deref().unwrap_or_default();
        let route_id = update.trip.route_id.as_deref().unwrap_or_default();
        let vehicle = update
            .vehicle
            .as_ref()
            .and_then(|v| v.label.as_deref())
            .unwrap_or_default();

        for stu in &update.stop_time_updates {
            let stop_id = stu.stop_id.as_deref().unwrap_or_default();
            let scheduled = schedule.stop_time_for_trip_and_stop(trip_id, stop_id);
            let sched_arrival = scheduled
                .map(|st| local_clock(anchor + st.arrival_time, tz))
                .unwrap_or_default();
            let sched_departure = scheduled
                .map(|st| local_clock(anchor + st.departure_time, tz))
                .unwrap_or_default();

            let actual_arrival = actual(stu.arrival, tz);
            let actual_departure = actual(stu.departure, tz);

            writer.write_record([
                service_date.as_str(),
                trip_id,
                route_id,
                vehicle,
                stop_id,
                sched_arrival.as_str(),
                actual_arrival.as_str(),
                sched_departure.as_str(),
                actual_departure.as_str(),
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Halifax;

    use crate::realtime::{StopTimeUpdate, TripDescriptor, VehicleDescriptor};
    use crate::schedule::fixtures::sample_index;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Halifax
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn update(
        trip: &str,
        start_date: &str,
        start_time: Option<&str>,
        stops: Vec<StopTimeUpdate>,
    ) -> TripUpdate {
        TripUpdate {
            trip: TripDescriptor {
                trip_id: Some(trip.into()),
                route_id: Some("R1".into()),
                start_date: Some(start_date.into()),
                start_time: start_time.map(Into::into),
                ..Default::default()
            },
            vehicle: Some(VehicleDescriptor {
                label: Some("1042".into()),
                ..Default::default()
            }),
            stop_time_updates: stops,
            ..Default::default()
        }
    }

    fn departed(stop: &str, seq: u32, at: DateTime<Utc>) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: Some(stop.into()),
            stop_sequence: Some(seq),
            departure: Some(StopTimeEvent {
                time: Some(at.timestamp()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn render(updates: Vec<TripUpdate>) -> String {
        let bytes = final_updates_csv(
            &sample_index(),
            &FinalUpdates {
                trip_updates: updates,
            },
        )
        .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn rows_carry_scheduled_and_actual_times() {
        let csv = render(vec![update(
            "T1",
            "20240315",
            Some("08:10:00"),
            vec![departed("S1", 1, local(2024, 3, 15, 8, 12))],
        )]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "20240315,T1,R1,1042,S1,08:10:00,,08:10:00,08:12:00");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn late_start_shifts_service_date() {
        let csv = render(vec![update(
            "TN",
            "20240316",
            Some("25:30:00"),
            vec![departed("S1", 1, local(2024, 3, 16, 1, 31))],
        )]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "20240315,TN,R1,1042,S1,01:30:00,,01:30:00,01:31:00");
    }

    #[test]
    fn unknown_stop_has_blank_schedule() {
        let csv = render(vec![update(
            "T1",
            "20240315",
            None,
            vec![departed("ZZ", 9, local(2024, 3, 15, 9, 0))],
        )]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "20240315,T1,R1,1042,ZZ,,,,09:00:00");
    }

    #[test]
    fn bad_start_date_is_an_error() {
        let err = final_updates_csv(
            &sample_index(),
            &FinalUpdates {
                trip_updates: vec![update("T1", "2024-03-15", None, vec![])],
            },
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::StartDate { .. }));

        let err = final_updates_csv(
            &sample_index(),
            &FinalUpdates {
                trip_updates: vec![update("T1", "20240315", Some("late"), vec![])],
            },
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::StartTime { .. }));
    }
}
