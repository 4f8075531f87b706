//! Shared domain types.
//!
//! Time handling lives here because both the static schedule and the live
//! feed need to agree on how service-day offsets become instants.

mod time;

pub use time::{
    ServiceTime, TimeError, format_service_date, from_posix, parse_service_date,
    service_day_anchor, truncate_to_minute,
};
