//! Reconciliation error types.

use chrono::{DateTime, Utc};

use crate::archive::ArchiveError;

/// Errors from reconciling final trip updates.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Request parameters are unusable
    #[error("{0}")]
    Validation(String),

    /// Archive lookup failed for one minute
    #[error("archive fetch for {minute} failed: {source}")]
    Archive {
        minute: DateTime<Utc>,
        #[source]
        source: ArchiveError,
    },

    /// Archive lookup did not finish in time
    #[error("archive fetch for {minute} timed out")]
    Timeout { minute: DateTime<Utc> },
}

impl ReconcileError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ReconcileError::Validation(_))
    }
}
