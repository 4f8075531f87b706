//! Departure planner configuration.

use chrono::Duration;

/// How departures are ordered in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepartureOrder {
    /// By scheduled departure, regardless of live estimates.
    #[default]
    Scheduled,
    /// By effective (estimated if available) departure.
    Effective,
}

/// Configuration parameters for departure planning.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// How far before the target time to include departures (minutes).
    pub lookback_mins: i64,

    /// How far after the target time to include departures (minutes).
    pub lookahead_mins: i64,

    /// Result ordering.
    pub order: DepartureOrder,
}

impl PlannerConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(lookback_mins: i64, lookahead_mins: i64, order: DepartureOrder) -> Self {
        Self {
            lookback_mins,
            lookahead_mins,
            order,
        }
    }

    pub fn with_order(mut self, order: DepartureOrder) -> Self {
        self.order = order;
        self
    }

    /// Returns the lookback as a Duration.
    pub fn lookback(&self) -> Duration {
        Duration::minutes(self.lookback_mins)
    }

    /// Returns the lookahead as a Duration.
    pub fn lookahead(&self) -> Duration {
        Duration::minutes(self.lookahead_mins)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lookback_mins: 5,
            lookahead_mins: 120, // 2 hours
            order: DepartureOrder::Scheduled,
        }
    }
}
