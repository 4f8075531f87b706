//! Final trip updates reconstructed from archived snapshots.
//!
//! Live predictions keep moving until the vehicle has actually served the
//! stop. Reconciliation reads one trip-updates snapshot per minute around a
//! past window, keeps the latest value seen per (trip instance, stop), and
//! only reports values whose predicted instant lies at least the stability
//! wait before the end of the window.

mod config;
mod error;
mod request;
mod stage;

pub use config::ReconcileConfig;
pub use error::ReconcileError;
pub use request::{FinalUpdatesRequest, QueryWindow};
pub use stage::{FinalUpdates, Stage};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::archive::{Snapshot, SnapshotArchive};
use crate::realtime::FeedKind;

/// Reconciler over a snapshot archive.
pub struct SnapshotReconciler<'a, A> {
    archive: &'a A,
    config: &'a ReconcileConfig,
}

impl<'a, A: SnapshotArchive> SnapshotReconciler<'a, A> {
    /// Create a new reconciler.
    pub fn new(archive: &'a A, config: &'a ReconcileConfig) -> Self {
        Self { archive, config }
    }

    /// Reconcile stabilized trip updates for `request`.
    ///
    /// Fails without a partial result if any minute's snapshot cannot be
    /// read; fetches still in flight are cancelled.
    pub async fn reconcile_final_updates(
        &self,
        request: &FinalUpdatesRequest,
    ) -> Result<FinalUpdates, ReconcileError> {
        let window = request.window(self.config)?;
        let snapshots = self.fetch_minutes(window.minutes()).await?;

        let mut stage = Stage::new();
        for snapshot in &snapshots {
            for trip_update in snapshot.message.trip_updates() {
                stage.observe(trip_update, snapshot.observed_at, request);
            }
        }
        debug!(
            snapshots = snapshots.len(),
            trips = stage.len(),
            "Staged trip updates"
        );

        Ok(stage.finish(window.end, self.config.stability_wait()))
    }

    /// Fetch one trip-updates snapshot per minute through a bounded pool.
    ///
    /// Results come back in minute order regardless of completion order.
    async fn fetch_minutes(
        &self,
        minutes: Vec<DateTime<Utc>>,
    ) -> Result<Vec<Snapshot>, ReconcileError> {
        let timeout = self.config.fetch_timeout;
        let count = minutes.len();

        let mut fetches = stream::iter(minutes.into_iter().enumerate())
            .map(|(i, minute)| async move {
                let result = tokio::time::timeout(
                    timeout,
                    self.archive.get_as_of(FeedKind::TripUpdates, minute),
                )
                .await;
                (i, minute, result)
            })
            .buffer_unordered(self.config.pool_size.max(1));

        let mut slots: Vec<Option<Snapshot>> = vec![None; count];
        while let Some((i, minute, result)) = fetches.next().await {
            let snapshot = match result {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(source)) => return Err(ReconcileError::Archive { minute, source }),
                Err(_) => return Err(ReconcileError::Timeout { minute }),
            };
            debug!(minute = %minute, i, "Fetched snapshot");
            slots[i] = Some(snapshot);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
