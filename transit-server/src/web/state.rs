//! Application state for the web layer.

use std::sync::Arc;

use crate::archive::ArchiveBackend;
use crate::live::LiveFeedCache;
use crate::planner::PlannerConfig;
use crate::reconcile::ReconcileConfig;
use crate::schedule::ScheduleIndex;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Static schedule, immutable after load
    pub schedule: Arc<ScheduleIndex>,

    /// Latest live feed messages
    pub feed: LiveFeedCache,

    /// Archived live feed snapshots
    pub archive: Arc<ArchiveBackend>,

    /// Departure planner configuration
    pub planner: Arc<PlannerConfig>,

    /// Final-updates reconciliation configuration
    pub reconcile: Arc<ReconcileConfig>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        schedule: Arc<ScheduleIndex>,
        feed: LiveFeedCache,
        archive: Arc<ArchiveBackend>,
        planner: PlannerConfig,
        reconcile: ReconcileConfig,
    ) -> Self {
        Self {
            schedule,
            feed,
            archive,
            planner: Arc::new(planner),
            reconcile: Arc::new(reconcile),
        }
    }
}
