//! Reconciliation requests and their validated query window.

use chrono::{DateTime, Duration, Utc};

use crate::domain::truncate_to_minute;

use super::config::ReconcileConfig;
use super::error::ReconcileError;

/// Parameters of a final-updates request.
///
/// Empty id lists allow everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalUpdatesRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub trip_ids: Vec<String>,
    pub route_ids: Vec<String>,
    pub stop_ids: Vec<String>,
}

impl FinalUpdatesRequest {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            trip_ids: Vec::new(),
            route_ids: Vec::new(),
            stop_ids: Vec::new(),
        }
    }

    pub fn with_trip_ids(mut self, ids: Vec<String>) -> Self {
        self.trip_ids = ids;
        self
    }

    pub fn with_route_ids(mut self, ids: Vec<String>) -> Self {
        self.route_ids = ids;
        self
    }

    pub fn with_stop_ids(mut self, ids: Vec<String>) -> Self {
        self.stop_ids = ids;
        self
    }

    /// Check the window and derive the minutes to read from the archive.
    pub fn window(&self, config: &ReconcileConfig) -> Result<QueryWindow, ReconcileError> {
        let start = truncate_to_minute(self.start);
        let end = truncate_to_minute(self.end);

        if end <= start {
            return Err(ReconcileError::Validation(
                "endTime must be after startTime".to_string(),
            ));
        }
        if end - start > config.max_window() {
            return Err(ReconcileError::Validation(format!(
                "endTime must be no more than {} hours after startTime",
                config.max_window().num_hours()
            )));
        }

        let wait = config.stability_wait();
        Ok(QueryWindow {
            start,
            end,
            query_start: start - wait * 2,
            query_end: end + wait,
        })
    }

    pub(crate) fn allows_trip(&self, trip_id: Option<&str>) -> bool {
        allows(&self.trip_ids, trip_id)
    }

    pub(crate) fn allows_route(&self, route_id: Option<&str>) -> bool {
        allows(&self.route_ids, route_id)
    }

    pub(crate) fn allows_stop(&self, stop_id: Option<&str>) -> bool {
        allows(&self.stop_ids, stop_id)
    }
}

fn allows(list: &[String], id: Option<&str>) -> bool {
    list.is_empty() || list.iter().any(|allowed| Some(allowed.as_str()) == id)
}

/// A validated request window.
///
/// `start` and `end` are the caller's instants truncated to the minute. The
/// query bounds widen them so early leavers and late finalisations are seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub query_start: DateTime<Utc>,
    pub query_end: DateTime<Utc>,
}

impl QueryWindow {
    /// Every minute in `[query_start, query_end]`, ascending.
    pub fn minutes(&self) -> Vec<DateTime<Utc>> {
        let mut minutes = Vec::new();
        let mut minute = self.query_start;
        while minute <= self.query_end {
            minutes.push(minute);
            minute += Duration::minutes(1);
        }
        minutes
    }
}
