//! Read-through cache over a snapshot archive.
//!
//! Archived minutes stop changing once the archiver has moved past them, so
//! lookups for settled minutes are cached. Lookups for the current minute
//! (and the last few) always reach the backend.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::domain::truncate_to_minute;
use crate::realtime::{FeedKind, LiveMessage};

use super::{ArchiveError, Snapshot, SnapshotArchive};

/// Cache key: (kind, minute as POSIX seconds).
type MinuteKey = (FeedKind, i64);

/// Configuration for the snapshot cache.
#[derive(Debug, Clone)]
pub struct ArchiveCacheConfig {
    /// TTL for cached snapshots.
    pub ttl: Duration,

    /// Maximum number of cached snapshots.
    pub max_capacity: u64,

    /// How old a minute must be before its lookups are cached.
    pub settle: Duration,
}

impl Default for ArchiveCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            max_capacity: 2000,
            settle: Duration::from_secs(120),
        }
    }
}

/// Snapshot archive with caching.
pub struct CachedArchive<A> {
    inner: A,
    snapshots: MokaCache<MinuteKey, Snapshot>,
    settle: chrono::Duration,
}

impl<A> CachedArchive<A> {
    pub fn new(inner: A, config: &ArchiveCacheConfig) -> Self {
        let snapshots = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        let settle = chrono::Duration::from_std(config.settle)
            .unwrap_or_else(|_| chrono::Duration::minutes(2));

        Self {
            inner,
            snapshots,
            settle,
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of cached snapshots (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.snapshots.entry_count()
    }

    fn is_settled(&self, minute: DateTime<Utc>) -> bool {
        Utc::now() - minute >= self.settle
    }
}

impl<A> fmt::Debug for CachedArchive<A>
where
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedArchive")
            .field("inner", &self.inner)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl<A: SnapshotArchive> SnapshotArchive for CachedArchive<A> {
    async fn get_as_of(&self, kind: FeedKind, at: DateTime<Utc>) -> Result<Snapshot, ArchiveError> {
        let minute = truncate_to_minute(at);
        if !self.is_settled(minute) {
            return self.inner.get_as_of(kind, minute).await;
        }

        let key = (kind, minute.timestamp());
        if let Some(snapshot) = self.snapshots.get(&key).await {
            trace!(kind = %kind, minute = %minute, "Snapshot cache hit");
            return Ok(snapshot);
        }

        // Misses are not cached; the minute may still be backfilled.
        let snapshot = self.inner.get_as_of(kind, minute).await?;
        self.snapshots.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn put(&self, kind: FeedKind, message: &LiveMessage) -> Result<String, ArchiveError> {
        let key = self.inner.put(kind, message).await?;
        if let Some(at) = message.observed_at() {
            let minute = truncate_to_minute(at);
            self.snapshots.invalidate(&(kind, minute.timestamp())).await;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn msg_at(at: DateTime<Utc>) -> LiveMessage {
        LiveMessage {
            timestamp: at.timestamp() as u64,
            entities: vec![],
        }
    }

    fn cached() -> CachedArchive<MemoryArchive> {
        CachedArchive::new(MemoryArchive::new(), &ArchiveCacheConfig::default())
    }

    #[tokio::test]
    async fn settled_minutes_are_cached() {
        let archive = cached();
        let old = truncate_to_minute(Utc::now()) - chrono::Duration::minutes(30);
        archive.put(FeedKind::TripUpdates, &msg_at(old)).await.unwrap();

        archive.get_as_of(FeedKind::TripUpdates, old).await.unwrap();
        archive.get_as_of(FeedKind::TripUpdates, old).await.unwrap();
        assert_eq!(archive.inner().reads(), 1);
    }

    #[tokio::test]
    async fn recent_minutes_bypass_cache() {
        let archive = cached();
        let now = Utc::now();
        archive.put(FeedKind::TripUpdates, &msg_at(now)).await.unwrap();

        archive.get_as_of(FeedKind::TripUpdates, now).await.unwrap();
        archive.get_as_of(FeedKind::TripUpdates, now).await.unwrap();
        assert_eq!(archive.inner().reads(), 2);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let archive = cached();
        let old = truncate_to_minute(Utc::now()) - chrono::Duration::minutes(30);

        assert!(archive.get_as_of(FeedKind::Alerts, old).await.is_err());
        archive.put(FeedKind::Alerts, &msg_at(old)).await.unwrap();
        assert!(archive.get_as_of(FeedKind::Alerts, old).await.is_ok());
    }

    #[tokio::test]
    async fn put_invalidates_minute() {
        let archive = cached();
        let old = truncate_to_minute(Utc::now()) - chrono::Duration::minutes(30);
        archive.put(FeedKind::Alerts, &msg_at(old)).await.unwrap();
        let first = archive.get_as_of(FeedKind::Alerts, old).await.unwrap();

        let later = old + chrono::Duration::seconds(30);
        archive.put(FeedKind::Alerts, &msg_at(later)).await.unwrap();
        let second = archive.get_as_of(FeedKind::Alerts, old).await.unwrap();

        assert_ne!(first.key, second.key);
        assert_eq!(second.observed_at, later);
    }
}
