//! Web layer for the transit server.
//!
//! Provides HTTP endpoints for schedule lookups, live feed views, stop
//! departures, archived snapshots and reconciled final updates.

mod dto;
mod error;
mod export;
mod routes;
mod state;

pub use dto::*;
pub use error::AppError;
pub use export::{CSV_HEADER, ExportError, final_updates_csv};
pub use routes::create_router;
pub use state::AppState;
