//! Process configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::live::FeedConfig;
use crate::realtime::FeedKind;
use crate::schedule::GtfsSource;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Errors reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// GTFS static feed: zip or directory path, or an http(s) zip URL
    pub gtfs: GtfsSource,

    /// Live feed sources and polling
    pub feed: FeedConfig,

    /// Snapshot archive root; in-memory archive when unset
    pub archive_dir: Option<PathBuf>,

    /// Whether to run the archiver loop
    pub archive_enabled: bool,

    /// Listen address
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    ///
    /// `GTFS_PATH` is required and may be a local path or an `http(s)` URL
    /// to download the zip from. Live feed kinds without a URL variable are
    /// disabled. The archiver runs by default only when `ARCHIVE_DIR` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gtfs = get("GTFS_PATH")
            .map(|raw| GtfsSource::parse(raw.trim()))
            .ok_or(ConfigError::Missing("GTFS_PATH"))?;

        let mut feed = FeedConfig::default();
        for (name, kind) in [
            ("TRIP_UPDATES_URL", FeedKind::TripUpdates),
            ("VEHICLE_POSITIONS_URL", FeedKind::VehiclePositions),
            ("ALERTS_URL", FeedKind::Alerts),
        ] {
            if let Some(url) = get(name) {
                feed = feed.with_url(kind, url);
            }
        }
        if let Some(raw) = get("FEED_INTERVAL_SECS") {
            let secs: u64 = raw
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::Invalid {
                    name: "FEED_INTERVAL_SECS",
                    value: raw.clone(),
                })?;
            feed = feed.with_interval(Duration::from_secs(secs));
        }

        let archive_dir = get("ARCHIVE_DIR").map(PathBuf::from);
        let archive_enabled = match get("ARCHIVE_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                name: "ARCHIVE_ENABLED",
                value: raw,
            })?,
            None => archive_dir.is_some(),
        };

        let raw_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: raw_addr.clone(),
        })?;

        Ok(Self {
            gtfs,
            feed,
            archive_dir,
            archive_enabled,
            bind_addr,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
