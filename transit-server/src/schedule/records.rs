//! Static schedule records.
//!
//! Plain data as loaded from a GTFS feed. Validation happens when the records
//! are handed to [`ScheduleIndex::build`](super::ScheduleIndex::build).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::domain::ServiceTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agency {
    pub id: Option<String>,
    pub name: String,
    /// IANA timezone name, e.g. "America/Halifax".
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Stop {
    pub id: String,
    pub code: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub parent_station: Option<String>,
    pub location_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Route {
    pub id: String,
    pub agency_id: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub route_type: i32,
    pub color: Option<String>,
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub service_id: String,
    pub headsign: Option<String>,
    pub short_name: Option<String>,
    pub direction_id: Option<u8>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
}

/// A scheduled call at a stop.
///
/// Times are offsets from the service-day anchor and may exceed 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub arrival_time: ServiceTime,
    pub departure_time: ServiceTime,
    pub stop_headsign: Option<String>,
}

/// Weekly service pattern over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Calendar {
    /// Whether the weekday flag for `date`'s day of week is set.
    pub fn runs_on_weekday(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    /// Whether the base weekly pattern covers `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date && self.runs_on_weekday(date.weekday())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExceptionType {
    Added,
    Removed,
}

/// A one-off change to a service on a single date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
}

/// Everything needed to build a [`ScheduleIndex`](super::ScheduleIndex).
#[derive(Debug, Clone, Default)]
pub struct ScheduleRecords {
    pub agencies: Vec<Agency>,
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub calendars: Vec<Calendar>,
    pub calendar_dates: Vec<CalendarDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekdays_only() -> Calendar {
        Calendar {
            service_id: "WK".into(),
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
            sunday: false,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        }
    }

    #[test]
    fn covers_respects_weekday() {
        let cal = weekdays_only();
        // 2024-03-15 is a Friday, 2024-03-16 a Saturday.
        assert!(cal.covers(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
        assert!(!cal.covers(NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()));
    }

    #[test]
    fn covers_is_inclusive() {
        let cal = weekdays_only();
        assert!(cal.covers(cal.start_date));
        // 2024-06-30 is a Sunday; move the end onto a weekday.
        let cal = Calendar {
            end_date: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            ..cal
        };
        assert!(cal.covers(cal.end_date));
        assert!(!cal.covers(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
        assert!(!cal.covers(NaiveDate::from_ymd_opt(2023, 12, 29).unwrap()));
    }
}
