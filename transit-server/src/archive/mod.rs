//! Archived live-feed snapshots.
//!
//! Every few seconds the [`Archiver`] writes the live feed's current message
//! per kind under a time-ordered key (see [`key`]). Readers look snapshots up
//! by kind and minute through [`SnapshotArchive::get_as_of`].
//!
//! Backends:
//! - [`FsArchive`] stores keys as files under a root directory
//! - [`MemoryArchive`] keeps encoded snapshots in a map
//! - [`CachedArchive`] wraps another backend with a read-through cache

mod archiver;
mod cached;
mod error;
mod fs;
pub mod key;
mod memory;

pub use archiver::{Archiver, ArchiverConfig};
pub use cached::{ArchiveCacheConfig, CachedArchive};
pub use error::ArchiveError;
pub use fs::FsArchive;
pub use memory::MemoryArchive;

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::realtime::{FeedKind, LiveMessage, decode_message};

/// One archived live-feed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub kind: FeedKind,
    /// Archive key the snapshot was read from.
    pub key: String,
    /// When the message was produced.
    pub observed_at: DateTime<Utc>,
    pub message: Arc<LiveMessage>,
}

impl Snapshot {
    /// Decode stored bytes.
    ///
    /// The observation instant is the message header timestamp, falling back
    /// to the instant encoded in the key when the header has none.
    pub fn decode(kind: FeedKind, key: String, bytes: &[u8]) -> Result<Self, ArchiveError> {
        let message = decode_message(bytes).map_err(|e| ArchiveError::Decode {
            key: key.clone(),
            message: e.to_string(),
        })?;
        let observed_at = message
            .observed_at()
            .or_else(|| key::key_time(&key))
            .ok_or_else(|| ArchiveError::Decode {
                key: key.clone(),
                message: "no timestamp in header or key".to_string(),
            })?;

        Ok(Self {
            kind,
            key,
            observed_at,
            message: Arc::new(message),
        })
    }

    /// Decode bytes as stored under `key`, inflating gzip keys first.
    pub fn from_stored(kind: FeedKind, key: String, stored: &[u8]) -> Result<Self, ArchiveError> {
        if !key::is_compressed(&key) {
            return Self::decode(kind, key, stored);
        }
        let mut raw = Vec::new();
        GzDecoder::new(stored)
            .read_to_end(&mut raw)
            .map_err(|e| ArchiveError::Decode {
                key: key.clone(),
                message: format!("gzip: {e}"),
            })?;
        Self::decode(kind, key, &raw)
    }
}

/// Trait for reading and writing archived snapshots.
///
/// This abstraction lets the reconciler run against an in-memory archive in
/// tests and a filesystem archive in production.
pub trait SnapshotArchive: Send + Sync + 'static {
    /// The latest snapshot of `kind` archived within `at`'s minute.
    fn get_as_of(
        &self,
        kind: FeedKind,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Snapshot, ArchiveError>> + Send;

    /// Store `message` under the key for its header timestamp.
    ///
    /// Returns the key written.
    fn put(
        &self,
        kind: FeedKind,
        message: &LiveMessage,
    ) -> impl Future<Output = Result<String, ArchiveError>> + Send;
}

/// Archive backend chosen at startup.
#[derive(Debug)]
pub enum ArchiveBackend {
    Fs(CachedArchive<FsArchive>),
    Memory(MemoryArchive),
}

impl SnapshotArchive for ArchiveBackend {
    async fn get_as_of(&self, kind: FeedKind, at: DateTime<Utc>) -> Result<Snapshot, ArchiveError> {
        match self {
            ArchiveBackend::Fs(archive) => archive.get_as_of(kind, at).await,
            ArchiveBackend::Memory(archive) => archive.get_as_of(kind, at).await,
        }
    }

    async fn put(&self, kind: FeedKind, message: &LiveMessage) -> Result<String, ArchiveError> {
        match self {
            ArchiveBackend::Fs(archive) => archive.put(kind, message).await,
            ArchiveBackend::Memory(archive) => archive.put(kind, message).await,
        }
    }
}

/// The key a message should be stored under, from its header timestamp.
pub(crate) fn key_for_message(kind: FeedKind, message: &LiveMessage) -> Result<String, ArchiveError> {
    let at = message.observed_at().ok_or_else(|| ArchiveError::Decode {
        key: kind.to_string(),
        message: "message has no header timestamp".to_string(),
    })?;
    Ok(key::snapshot_key(kind, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::encode_message;

    #[test]
    fn snapshot_uses_header_timestamp() {
        let msg = LiveMessage {
            timestamp: 1_710_501_005,
            entities: vec![],
        };
        let snap = Snapshot::decode(
            FeedKind::TripUpdates,
            "TripUpdates/2024/03/15/11/TripUpdates-2024-03-15T11-10-00Z.pb".into(),
            &encode_message(&msg),
        )
        .unwrap();
        assert_eq!(snap.observed_at.timestamp(), 1_710_501_005);
        assert_eq!(*snap.message, msg);
    }

    #[test]
    fn snapshot_falls_back_to_key_time() {
        let snap = Snapshot::decode(
            FeedKind::TripUpdates,
            "TripUpdates/2024/03/15/11/TripUpdates-2024-03-15T11-10-00Z.pb".into(),
            &encode_message(&LiveMessage::empty()),
        )
        .unwrap();
        assert_eq!(snap.observed_at, key::key_time(&snap.key).unwrap());
    }

    #[test]
    fn gzip_keys_are_inflated() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let msg = LiveMessage {
            timestamp: 1_710_501_005,
            entities: vec![],
        };
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encode_message(&msg)).unwrap();
        let stored = encoder.finish().unwrap();

        let key = "Alerts/2024/03/15/11/Alerts-2024-03-15T11-10-05Z.pb.gz".to_string();
        let snap = Snapshot::from_stored(FeedKind::Alerts, key.clone(), &stored).unwrap();
        assert_eq!(*snap.message, msg);

        let err = Snapshot::from_stored(FeedKind::Alerts, key, b"not gzip").unwrap_err();
        assert!(matches!(err, ArchiveError::Decode { .. }));
    }

    #[test]
    fn message_without_timestamp_has_no_key() {
        let err = key_for_message(FeedKind::Alerts, &LiveMessage::empty()).unwrap_err();
        assert!(matches!(err, ArchiveError::Decode { .. }));
    }
}
