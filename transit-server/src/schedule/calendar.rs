//! Calendar resolution: which services run on a date.

use std::collections::HashSet;

use chrono::NaiveDate;

use super::records::{Calendar, CalendarDate, ExceptionType};

/// Resolve the set of service IDs active on `date`.
///
/// The weekly pattern is evaluated first, then every exception for `date` is
/// applied on top of it: `Added` inserts the service and `Removed` deletes it,
/// whatever the base pattern said. Exceptions for other dates are ignored.
pub fn active_services<'a>(
    date: NaiveDate,
    calendars: impl IntoIterator<Item = &'a Calendar>,
    exceptions: impl IntoIterator<Item = &'a CalendarDate>,
) -> HashSet<String> {
    let mut active: HashSet<String> = calendars
        .into_iter()
        .filter(|c| c.covers(date))
        .map(|c| c.service_id.clone())
        .collect();

    for exception in exceptions.into_iter().filter(|e| e.date == date) {
        match exception.exception_type {
            ExceptionType::Added => {
                active.insert(exception.service_id.clone());
            }
            ExceptionType::Removed => {
                active.remove(&exception.service_id);
            }
        }
    }

    active
}
