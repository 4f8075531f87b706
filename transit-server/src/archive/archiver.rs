//! Periodic copy of the live feed into the archive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::live::LiveFeedCache;
use crate::realtime::FeedKind;
use crate::task::BackgroundTask;

use super::{ArchiveError, SnapshotArchive};

/// Configuration for the archiver loop.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Time between archive rounds
    pub interval: Duration,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Writes each feed kind's current message to the archive when it changes.
///
/// A message is skipped when it has no entities or its header timestamp has
/// not advanced past the last one archived for that kind. A failed write
/// leaves the last timestamp alone so the next round retries.
pub struct Archiver<A> {
    archive: Arc<A>,
    feed: LiveFeedCache,
    config: ArchiverConfig,
    last_archived: Mutex<HashMap<FeedKind, u64>>,
}

impl<A: SnapshotArchive> Archiver<A> {
    pub fn new(archive: Arc<A>, feed: LiveFeedCache, config: ArchiverConfig) -> Self {
        Self {
            archive,
            feed,
            config,
            last_archived: Mutex::new(HashMap::new()),
        }
    }

    fn last_timestamp(&self, kind: FeedKind) -> u64 {
        self.last_archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    /// Archive one kind. Returns the key written, or `None` if skipped.
    pub async fn archive_kind(&self, kind: FeedKind) -> Result<Option<String>, ArchiveError> {
        let message = self.feed.current(kind);
        if message.is_empty() || message.timestamp <= self.last_timestamp(kind) {
            return Ok(None);
        }

        let key = self.archive.put(kind, &message).await?;
        self.last_archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, message.timestamp);
        Ok(Some(key))
    }

    /// Archive every configured kind. Returns how many snapshots were written.
    pub async fn archive_once(&self) -> usize {
        let kinds: Vec<FeedKind> = self.feed.config().configured_kinds().collect();
        let results = join_all(kinds.iter().map(|kind| self.archive_kind(*kind))).await;

        let mut written = 0;
        for (kind, result) in kinds.into_iter().zip(results) {
            match result {
                Ok(Some(key)) => {
                    written += 1;
                    debug!(kind = %kind, key = %key, "Archived snapshot");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Failed to archive snapshot");
                }
            }
        }
        written
    }

    /// Spawn the archive loop.
    pub fn start(self: Arc<Self>) -> BackgroundTask {
        BackgroundTask::spawn("snapshot-archiver", async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.archive_once().await;
            }
        })
    }
}
