//! Live feed polling and point lookups.
//!
//! [`LiveFeedCache`] keeps the most recent message per feed kind and refreshes
//! it on a fixed interval through a [`FetchLive`] implementation. The HTTP
//! implementation is [`FeedClient`](crate::realtime::FeedClient); tests use a
//! scripted fetcher.

mod cache;

pub use cache::{FeedConfig, LiveFeedCache};

use crate::realtime::{FeedError, FeedKind, LiveMessage};

/// Trait for fetching a live feed.
///
/// This abstraction allows the cache to be tested without network access.
pub trait FetchLive: Send + Sync + 'static {
    /// Fetch and decode the current message for `kind` from `url`.
    fn fetch_live(
        &self,
        kind: FeedKind,
        url: &str,
    ) -> impl Future<Output = Result<LiveMessage, FeedError>> + Send;
}
