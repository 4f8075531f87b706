//! A small schedule shared by tests across the crate.
//!
//! One route in America/Halifax with three stops:
//! - `WK` runs Monday to Friday through 2024, removed on 2024-04-01
//! - `NIGHT` runs on Fridays only; trip `TN` calls at S1 at 25:30:00
//! - `HOLIDAY` runs only on 2024-04-01

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::ServiceTime;

use super::index::ScheduleIndex;
use super::records::{
    Agency, Calendar, CalendarDate, ExceptionType, Route, ScheduleRecords, Stop, StopTime, Trip,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stop(id: &str, name: &str) -> Stop {
    Stop {
        id: id.into(),
        name: Some(name.into()),
        latitude: Some(44.65),
        longitude: Some(-63.57),
        ..Default::default()
    }
}

fn trip(id: &str, service_id: &str) -> Trip {
    Trip {
        id: id.into(),
        route_id: "R1".into(),
        service_id: service_id.into(),
        headsign: Some("Depot".into()),
        ..Default::default()
    }
}

fn calendar(service_id: &str, weekdays: [bool; 7]) -> Calendar {
    let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = weekdays;
    Calendar {
        service_id: service_id.into(),
        monday,
        tuesday,
        wednesday,
        thursday,
        friday,
        saturday,
        sunday,
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
    }
}

pub fn stop_time(trip_id: &str, stop_id: &str, sequence: u32, at: &str) -> StopTime {
    let t = ServiceTime::parse_hms(at).unwrap();
    StopTime {
        trip_id: trip_id.into(),
        stop_id: stop_id.into(),
        stop_sequence: sequence,
        arrival_time: t,
        departure_time: t,
        stop_headsign: None,
    }
}

pub fn sample_records() -> ScheduleRecords {
    ScheduleRecords {
        agencies: vec![Agency {
            id: Some("HT".into()),
            name: "Harbour Transit".into(),
            timezone: "America/Halifax".into(),
        }],
        stops: vec![
            stop("S1", "Main St"),
            stop("S2", "Harbour"),
            stop("S3", "Depot"),
        ],
        routes: vec![Route {
            id: "R1".into(),
            agency_id: Some("HT".into()),
            short_name: Some("1".into()),
            long_name: Some("Harbourside".into()),
            route_type: 3,
            ..Default::default()
        }],
        trips: vec![
            trip("T1", "WK"),
            trip("T2", "WK"),
            trip("T3", "WK"),
            trip("TE", "WK"),
            trip("TN", "NIGHT"),
        ],
        stop_times: vec![
            stop_time("T1", "S1", 1, "08:10:00"),
            stop_time("T1", "S2", 2, "08:20:00"),
            stop_time("T1", "S3", 3, "08:30:00"),
            stop_time("T2", "S1", 1, "08:40:00"),
            stop_time("T2", "S2", 2, "08:50:00"),
            stop_time("T3", "S1", 1, "10:30:00"),
            stop_time("TE", "S1", 1, "07:50:00"),
            stop_time("TN", "S1", 1, "25:30:00"),
            stop_time("TN", "S2", 2, "25:40:00"),
        ],
        calendars: vec![
            calendar("WK", [true, true, true, true, true, false, false]),
            calendar("NIGHT", [false, false, false, false, true, false, false]),
            calendar("HOLIDAY", [false; 7]),
        ],
        calendar_dates: vec![
            CalendarDate {
                service_id: "WK".into(),
                date: date(2024, 4, 1),
                exception_type: ExceptionType::Removed,
            },
            CalendarDate {
                service_id: "HOLIDAY".into(),
                date: date(2024, 4, 1),
                exception_type: ExceptionType::Added,
            },
        ],
    }
}

pub fn sample_index() -> Arc<ScheduleIndex> {
    Arc::new(ScheduleIndex::build(sample_records()).unwrap())
}
