//! Transit departures and final-updates server.
//!
//! Answers two questions about a transit network: what is about to leave a
//! stop (static GTFS schedule merged with the live GTFS-realtime feed), and
//! what the live feed stably reported for trips over a past window
//! (reconciled from archived feed snapshots).

pub mod archive;
pub mod config;
pub mod domain;
pub mod inspect;
pub mod live;
pub mod planner;
pub mod realtime;
pub mod reconcile;
pub mod schedule;
pub mod task;
pub mod web;
