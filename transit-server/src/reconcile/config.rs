//! Reconciliation configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Configuration parameters for final-update reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How long after its predicted instant an update is considered final (minutes).
    pub stability_wait_mins: i64,

    /// Longest accepted window between start and end (minutes).
    pub max_window_mins: i64,

    /// Number of archive fetches in flight at once.
    pub pool_size: usize,

    /// Upper bound on a single archive fetch.
    pub fetch_timeout: StdDuration,
}

impl ReconcileConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(stability_wait_mins: i64, max_window_mins: i64, pool_size: usize) -> Self {
        Self {
            stability_wait_mins,
            max_window_mins,
            pool_size,
            ..Self::default()
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Returns the stability wait as a Duration.
    pub fn stability_wait(&self) -> Duration {
        Duration::minutes(self.stability_wait_mins)
    }

    /// Returns the maximum window as a Duration.
    pub fn max_window(&self) -> Duration {
        Duration::minutes(self.max_window_mins)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stability_wait_mins: 5,
            max_window_mins: 240, // 4 hours
            pool_size: 10,
            fetch_timeout: StdDuration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.stability_wait(), Duration::minutes(5));
        assert_eq!(config.max_window(), Duration::hours(4));
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.fetch_timeout, StdDuration::from_secs(10));
    }

    #[test]
    fn custom_config() {
        let config = ReconcileConfig::new(2, 60, 3).with_fetch_timeout(StdDuration::from_secs(1));
        assert_eq!(config.stability_wait(), Duration::minutes(2));
        assert_eq!(config.max_window(), Duration::hours(1));
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.fetch_timeout, StdDuration::from_secs(1));
    }
}
