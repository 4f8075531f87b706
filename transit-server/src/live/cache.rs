//! Polling snapshot cell per live feed kind.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::realtime::{FeedError, FeedKind, LiveMessage, StopTimeUpdate, VehiclePosition};
use crate::task::BackgroundTask;

use super::FetchLive;

/// Configuration for live feed polling.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Trip updates source; `None` disables the kind
    pub trip_updates_url: Option<String>,
    /// Vehicle positions source; `None` disables the kind
    pub vehicle_positions_url: Option<String>,
    /// Alerts source; `None` disables the kind
    pub alerts_url: Option<String>,
    /// Time between refresh rounds
    pub interval: Duration,
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            trip_updates_url: None,
            vehicle_positions_url: None,
            alerts_url: None,
            interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// Set the source URL for a kind.
    pub fn with_url(mut self, kind: FeedKind, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match kind {
            FeedKind::TripUpdates => self.trip_updates_url = url,
            FeedKind::VehiclePositions => self.vehicle_positions_url = url,
            FeedKind::Alerts => self.alerts_url = url,
        }
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// The source URL for a kind, if configured.
    pub fn url(&self, kind: FeedKind) -> Option<&str> {
        match kind {
            FeedKind::TripUpdates => self.trip_updates_url.as_deref(),
            FeedKind::VehiclePositions => self.vehicle_positions_url.as_deref(),
            FeedKind::Alerts => self.alerts_url.as_deref(),
        }
    }

    /// Kinds that have a source URL.
    pub fn configured_kinds(&self) -> impl Iterator<Item = FeedKind> + '_ {
        FeedKind::ALL
            .into_iter()
            .filter(|kind| self.url(*kind).is_some())
    }
}

/// One published message. Readers clone the `Arc` and release the lock.
type Cell = RwLock<Arc<LiveMessage>>;

#[derive(Debug, Default)]
struct Cells {
    trip_updates: Cell,
    vehicle_positions: Cell,
    alerts: Cell,
}

/// Latest live message per feed kind.
///
/// Each refresh replaces a kind's message wholesale, so a reader holding the
/// previous `Arc` keeps a consistent view while the new one is published.
/// A failed refresh leaves the previous message in place. Kinds without a
/// URL never refresh and read as an empty message.
///
/// Cloning is cheap and clones share the same cells.
#[derive(Debug, Clone)]
pub struct LiveFeedCache {
    cells: Arc<Cells>,
    config: Arc<FeedConfig>,
}

impl LiveFeedCache {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            cells: Arc::new(Cells::default()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn cell(&self, kind: FeedKind) -> &Cell {
        match kind {
            FeedKind::TripUpdates => &self.cells.trip_updates,
            FeedKind::VehiclePositions => &self.cells.vehicle_positions,
            FeedKind::Alerts => &self.cells.alerts,
        }
    }

    /// The latest published message for `kind`.
    pub fn current(&self, kind: FeedKind) -> Arc<LiveMessage> {
        let guard = self
            .cell(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn current_trip_updates(&self) -> Arc<LiveMessage> {
        self.current(FeedKind::TripUpdates)
    }

    pub fn current_vehicle_positions(&self) -> Arc<LiveMessage> {
        self.current(FeedKind::VehiclePositions)
    }

    pub fn current_alerts(&self) -> Arc<LiveMessage> {
        self.current(FeedKind::Alerts)
    }

    /// Replace the message for `kind`.
    pub fn publish(&self, kind: FeedKind, message: LiveMessage) {
        let message = Arc::new(message);
        let mut guard = self
            .cell(kind)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = message;
    }

    /// The live update for a trip at a stop in the current trip updates.
    pub fn stop_time_update_for_trip_and_stop(
        &self,
        trip_id: &str,
        stop_id: &str,
    ) -> Option<StopTimeUpdate> {
        self.current_trip_updates()
            .stop_time_update(trip_id, stop_id)
            .cloned()
    }

    /// The current position of the vehicle serving a trip.
    pub fn vehicle_position_for_trip(&self, trip_id: &str) -> Option<VehiclePosition> {
        self.current_vehicle_positions()
            .vehicle_position(trip_id)
            .cloned()
    }

    /// Fetch and publish one kind. Returns the number of entities published.
    ///
    /// On any error the previous message is kept.
    pub async fn refresh_kind<F: FetchLive>(
        &self,
        fetcher: &F,
        kind: FeedKind,
    ) -> Result<usize, FeedError> {
        let url = self.config.url(kind).ok_or(FeedError::NotConfigured(kind))?;
        let message =
            match tokio::time::timeout(self.config.fetch_timeout, fetcher.fetch_live(kind, url))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FeedError::Timeout {
                        secs: self.config.fetch_timeout.as_secs(),
                    });
                }
            };

        let entities = message.entities.len();
        self.publish(kind, message);
        Ok(entities)
    }

    /// Refresh every configured kind concurrently.
    ///
    /// Failures are logged and skipped. Returns how many kinds were published.
    pub async fn refresh_once<F: FetchLive>(&self, fetcher: &F) -> usize {
        let kinds: Vec<FeedKind> = self.config.configured_kinds().collect();
        let results = join_all(kinds.iter().map(|kind| self.refresh_kind(fetcher, *kind))).await;

        let mut published = 0;
        for (kind, result) in kinds.into_iter().zip(results) {
            match result {
                Ok(entities) => {
                    published += 1;
                    debug!(kind = %kind, entities, "Published live feed");
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Live feed refresh failed, keeping previous");
                }
            }
        }
        published
    }

    /// Spawn the refresh loop. The first round runs immediately.
    pub fn start<F: FetchLive>(&self, fetcher: Arc<F>) -> BackgroundTask {
        let cache = self.clone();
        BackgroundTask::spawn("live-feed-refresh", async move {
            let mut interval = tokio::time::interval(cache.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                cache.refresh_once(fetcher.as_ref()).await;
            }
        })
    }
}
