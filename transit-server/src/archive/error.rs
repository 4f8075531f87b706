//! Snapshot archive error types.

use chrono::{DateTime, Utc};

use crate::realtime::FeedKind;

/// Errors from reading or writing archived snapshots.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Nothing archived for the kind in the requested minute
    #[error("no {kind} snapshot archived for {minute}")]
    NotFound {
        kind: FeedKind,
        minute: DateTime<Utc>,
    },

    /// Filesystem operation failed
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes are not a valid feed message
    #[error("corrupt snapshot {key}: {message}")]
    Decode { key: String, message: String },
}

impl ArchiveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }
}
