//! Service-day time handling for GTFS schedules.
//!
//! GTFS expresses stop times as "HH:MM:SS" offsets from the start of a
//! service day, and those offsets may exceed 24 hours for trips that run past
//! midnight. This module provides types for working with these offsets and
//! for anchoring them to an absolute instant in the agency's timezone.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Add;

/// Error returned when parsing an invalid time or date string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// An offset from the start of a service day.
///
/// Unlike a wall-clock time this may exceed 24 hours: a trip that leaves at
/// 00:30 after the end of Friday's service is scheduled as "24:30:00" under
/// Friday's service day.
///
/// # Examples
///
/// ```
/// use transit_server::domain::ServiceTime;
///
/// let t = ServiceTime::parse_hms("25:30:00").unwrap();
/// assert_eq!(t.as_secs(), 25 * 3600 + 30 * 60);
/// assert_eq!(t.to_string(), "25:30:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ServiceTime(u32);

impl ServiceTime {
    /// Create a service time from seconds since the service-day start.
    pub fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Create a service time from hours, minutes and seconds.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Parse a time from "H:MM:SS" or "HH:MM:SS" format.
    ///
    /// Hours are not limited to 0-23.
    ///
    /// ```
    /// use transit_server::domain::ServiceTime;
    ///
    /// assert!(ServiceTime::parse_hms("08:00:00").is_ok());
    /// assert!(ServiceTime::parse_hms("8:00:00").is_ok());
    /// assert!(ServiceTime::parse_hms("27:15:00").is_ok());
    ///
    /// assert!(ServiceTime::parse_hms("08:00").is_err());
    /// assert!(ServiceTime::parse_hms("08:60:00").is_err());
    /// assert!(ServiceTime::parse_hms("aa:00:00").is_err());
    /// ```
    pub fn parse_hms(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TimeError::new("expected H:MM:SS format"));
        };

        if h.is_empty() || h.len() > 3 {
            return Err(TimeError::new("invalid hour digits"));
        }
        let hours: u32 = parse_digits(h).ok_or_else(|| TimeError::new("invalid hour digits"))?;

        if m.len() != 2 {
            return Err(TimeError::new("expected two minute digits"));
        }
        let minutes = parse_digits(m).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        if sec.len() != 2 {
            return Err(TimeError::new("expected two second digits"));
        }
        let seconds = parse_digits(sec).ok_or_else(|| TimeError::new("invalid second digits"))?;
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }

        Ok(Self::from_hms(hours, minutes, seconds))
    }

    /// Seconds since the service-day start.
    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// Offset as a chrono duration.
    pub fn as_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.0))
    }

    /// Whole hours component (may be 24 or more).
    pub fn hours(&self) -> u32 {
        self.0 / 3600
    }

    /// Whether this offset falls on the following civil day.
    pub fn is_past_midnight(&self) -> bool {
        self.hours() >= 24
    }
}

impl Add<ServiceTime> for DateTime<Utc> {
    type Output = DateTime<Utc>;

    fn add(self, rhs: ServiceTime) -> Self::Output {
        self + rhs.as_duration()
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTime({self})")
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            (self.0 / 60) % 60,
            self.0 % 60
        )
    }
}

impl Serialize for ServiceTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// The instant a service day's stop-time offsets are measured from.
///
/// GTFS defines this as "noon minus 12 hours" in the agency timezone rather
/// than local midnight, so that on daylight-saving transition days (23 or 25
/// hour civil days) an offset of 12:00:00 still lands on local noon.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeZone, Timelike};
/// use chrono_tz::America::Halifax;
/// use transit_server::domain::{ServiceTime, service_day_anchor};
///
/// // Spring-forward day: local midnight is 04:00Z but the anchor is 03:00Z.
/// let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
/// let anchor = service_day_anchor(date, Halifax);
/// let noon = anchor + ServiceTime::from_hms(12, 0, 0);
/// assert_eq!(noon.with_timezone(&Halifax).hour(), 12);
/// ```
pub fn service_day_anchor(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let noon = date.and_time(NaiveTime::MIN) + Duration::hours(12);
    let local_noon = match tz.from_local_datetime(&noon) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t,
        // No real zone skips noon; fall back to reading it as UTC wall time.
        LocalResult::None => tz.from_utc_datetime(&noon),
    };
    local_noon.with_timezone(&Utc) - Duration::hours(12)
}

/// Parse a GTFS service date in "YYYYMMDD" format.
///
/// ```
/// use chrono::NaiveDate;
/// use transit_server::domain::parse_service_date;
///
/// let d = parse_service_date("20240315").unwrap();
/// assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
/// assert!(parse_service_date("2024-03-15").is_err());
/// ```
pub fn parse_service_date(s: &str) -> Result<NaiveDate, TimeError> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::new("expected YYYYMMDD format"));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| TimeError::new("invalid calendar date"))
}

/// Format a date in GTFS "YYYYMMDD" form.
pub fn format_service_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Truncate an instant down to the start of its minute.
pub fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Convert POSIX seconds from a realtime feed into an instant.
pub fn from_posix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
