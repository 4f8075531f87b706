//! Static GTFS schedule: records, calendar resolution, and lookup index.
//!
//! The index is built once at startup from a GTFS feed. All lookups borrow
//! from it and nothing mutates afterwards, so it is shared as
//! `Arc<ScheduleIndex>` without locking.

mod calendar;
mod error;
mod index;
mod load;
mod records;

#[cfg(test)]
pub(crate) mod fixtures;

pub use calendar::active_services;
pub use error::{LoadError, ScheduleError};
pub use index::ScheduleIndex;
pub use load::{GtfsSource, load_gtfs, load_gtfs_from, records_from_gtfs};
pub use records::{
    Agency, Calendar, CalendarDate, ExceptionType, Route, ScheduleRecords, Stop, StopTime, Trip,
};
