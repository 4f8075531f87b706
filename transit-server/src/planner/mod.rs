//! Departure planning for a stop.
//!
//! This module answers: "what leaves this stop soon, and when will it
//! actually go?" Scheduled calls are resolved from the static schedule for
//! the target's service day and the previous one, then enriched with the
//! current live feed.

mod config;
mod departures;

pub use config::{DepartureOrder, PlannerConfig};
pub use departures::{Departure, DeparturePlanner};
