//! Live feed fetch error types.

use super::types::FeedKind;

/// Errors from fetching or decoding a live feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (connection refused, reset, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed endpoint returned a non-success status
    #[error("feed returned status {status}")]
    Status { status: u16 },

    /// Body was not a valid GTFS-realtime message
    #[error("protobuf decode error: {message}")]
    Decode { message: String },

    /// Fetch did not complete within the configured timeout
    #[error("fetch timed out after {secs}s")]
    Timeout { secs: u64 },

    /// No source URL is configured for this kind
    #[error("no URL configured for {0}")]
    NotConfigured(FeedKind),
}
