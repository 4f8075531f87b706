//! Filesystem snapshot archive.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, trace, warn};

use crate::domain::truncate_to_minute;
use crate::realtime::{FeedKind, LiveMessage, encode_message};

use super::key::{self, GZ_EXT, PB_EXT};
use super::{ArchiveError, Snapshot, SnapshotArchive, key_for_message};

/// Staging directory for partly written snapshots, relative to the root.
pub const INCOMING_DIR: &str = ".incoming";

/// Staged files older than this are leftovers of interrupted writes.
const STALE_AFTER: Duration = Duration::from_secs(60);

/// Stores each snapshot as a file named by its key under `root`.
///
/// Writes are staged in [`INCOMING_DIR`] and renamed into place. Every `put`
/// also removes staged files older than a minute, which only an interrupted
/// write leaves behind.
///
/// Blocking filesystem work runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
    compress: bool,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compress: false,
        }
    }

    /// Write new snapshots gzip compressed. Reads handle both forms.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The greatest key in `minute` and its stored bytes.
fn latest_in_minute(
    root: &Path,
    kind: FeedKind,
    minute: DateTime<Utc>,
) -> Result<Option<(String, Vec<u8>)>, ArchiveError> {
    let dir = key::hour_dir(kind, minute);
    let prefix = key::minute_prefix(kind, minute);

    let entries = match std::fs::read_dir(root.join(&dir)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<String> = None;
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !(name.ends_with(PB_EXT) || name.ends_with(GZ_EXT)) {
            continue;
        }
        let candidate = format!("{dir}/{name}");
        if candidate.starts_with(&prefix) && latest.as_ref().is_none_or(|l| candidate > *l) {
            latest = Some(candidate);
        }
    }

    match latest {
        Some(key) => {
            let bytes = std::fs::read(root.join(&key))?;
            Ok(Some((key, bytes)))
        }
        None => Ok(None),
    }
}

/// Remove staged files last modified before `cutoff`. Returns how many.
fn sweep_incoming(root: &Path, cutoff: SystemTime) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(root.join(INCOMING_DIR)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() && metadata.modified()? < cutoff {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write `bytes` under `key` via a file in the staging directory and a rename.
fn write_atomically(root: &Path, key: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
    let path = root.join(key);
    let parent = path.parent().unwrap_or(root);
    std::fs::create_dir_all(parent)?;
    let incoming = root.join(INCOMING_DIR);
    std::fs::create_dir_all(&incoming)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let tmp = incoming.join(format!("{file_name}.tmp"));
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

fn join_error(e: tokio::task::JoinError) -> ArchiveError {
    ArchiveError::Io(std::io::Error::other(e))
}

impl SnapshotArchive for FsArchive {
    async fn get_as_of(&self, kind: FeedKind, at: DateTime<Utc>) -> Result<Snapshot, ArchiveError> {
        let minute = truncate_to_minute(at);
        let root = self.root.clone();
        let found = tokio::task::spawn_blocking(move || latest_in_minute(&root, kind, minute))
            .await
            .map_err(join_error)??;

        let (key, bytes) = found.ok_or(ArchiveError::NotFound { kind, minute })?;
        trace!(key = %key, bytes = bytes.len(), "Read archived snapshot");
        Snapshot::from_stored(kind, key, &bytes)
    }

    async fn put(&self, kind: FeedKind, message: &LiveMessage) -> Result<String, ArchiveError> {
        let mut key = key_for_message(kind, message)?;
        let mut bytes = encode_message(message);
        if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&bytes)?;
            bytes = encoder.finish()?;
            key.push_str(GZ_EXT);
        }

        let root = self.root.clone();
        let written = key.clone();
        tokio::task::spawn_blocking(move || {
            let cutoff = SystemTime::now()
                .checked_sub(STALE_AFTER)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match sweep_incoming(&root, cutoff) {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Removed partial snapshot writes"),
                Err(e) => warn!(error = %e, "Failed to clear staging directory"),
            }
            write_atomically(&root, &written, &bytes)
        })
        .await
        .map_err(join_error)??;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{Alert, FeedEntity};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
    }

    fn alert_message(when: DateTime<Utc>, header: &str) -> LiveMessage {
        LiveMessage {
            timestamp: when.timestamp() as u64,
            entities: vec![FeedEntity {
                id: "a1".into(),
                alert: Some(Alert {
                    header_text: Some(header.into()),
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn put_then_get_within_minute() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());

        let msg = alert_message(at(11, 10, 5), "detour");
        let key = archive.put(FeedKind::Alerts, &msg).await.unwrap();
        assert_eq!(key, "Alerts/2024/03/15/11/Alerts-2024-03-15T11-10-05Z.pb");
        assert!(dir.path().join(&key).is_file());

        let snap = archive
            .get_as_of(FeedKind::Alerts, at(11, 10, 59))
            .await
            .unwrap();
        assert_eq!(snap.key, key);
        assert_eq!(snap.observed_at, at(11, 10, 5));
        assert_eq!(*snap.message, msg);
    }

    #[tokio::test]
    async fn greatest_key_in_minute_wins() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());

        for (sec, header) in [(5, "first"), (50, "last"), (20, "middle")] {
            archive
                .put(FeedKind::Alerts, &alert_message(at(11, 10, sec), header))
                .await
                .unwrap();
        }
        // Next minute must not leak backwards.
        archive
            .put(FeedKind::Alerts, &alert_message(at(11, 11, 0), "next"))
            .await
            .unwrap();

        let snap = archive.get_as_of(FeedKind::Alerts, at(11, 10, 0)).await.unwrap();
        assert_eq!(snap.observed_at, at(11, 10, 50));
        let header = snap.message.alerts().next().unwrap().header_text.clone();
        assert_eq!(header.as_deref(), Some("last"));
    }

    #[tokio::test]
    async fn missing_minute_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        archive
            .put(FeedKind::Alerts, &alert_message(at(11, 10, 5), "x"))
            .await
            .unwrap();

        let err = archive
            .get_as_of(FeedKind::Alerts, at(11, 12, 0))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = archive
            .get_as_of(FeedKind::TripUpdates, at(11, 10, 0))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn compressed_snapshots_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path()).with_compression(true);

        let msg = alert_message(at(23, 59, 59), "late");
        let key = archive.put(FeedKind::Alerts, &msg).await.unwrap();
        assert!(key.ends_with(".pb.gz"));

        let snap = archive.get_as_of(FeedKind::Alerts, at(23, 59, 0)).await.unwrap();
        assert_eq!(*snap.message, msg);
    }

    #[tokio::test]
    async fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = key::snapshot_key(FeedKind::Alerts, at(8, 0, 1));
        let path = dir.path().join(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, [0xff, 0xff, 0xff]).unwrap();

        let archive = FsArchive::new(dir.path());
        let err = archive
            .get_as_of(FeedKind::Alerts, at(8, 0, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Decode { .. }));
    }

    #[tokio::test]
    async fn staged_writes_leave_hour_dir_clean() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        let key = archive
            .put(FeedKind::Alerts, &alert_message(at(11, 10, 5), "x"))
            .await
            .unwrap();

        let hour = dir.path().join(&key);
        let names: Vec<_> = std::fs::read_dir(hour.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![hour.file_name().unwrap().to_owned()]);

        let incoming = std::fs::read_dir(dir.path().join(INCOMING_DIR)).unwrap();
        assert_eq!(incoming.count(), 0);
    }

    #[tokio::test]
    async fn put_clears_stale_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = dir.path().join(INCOMING_DIR);
        std::fs::create_dir_all(&incoming).unwrap();

        let stale = incoming.join("Alerts-2024-03-15T09-00-00Z.pb.tmp");
        std::fs::write(&stale, b"partial").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();
        // A write still in flight elsewhere.
        let fresh = incoming.join("TripUpdates-2024-03-15T11-10-05Z.pb.tmp");
        std::fs::write(&fresh, b"partial").unwrap();

        let archive = FsArchive::new(dir.path());
        archive
            .put(FeedKind::Alerts, &alert_message(at(11, 10, 5), "x"))
            .await
            .unwrap();

        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn message_without_timestamp_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        assert!(archive.put(FeedKind::Alerts, &LiveMessage::empty()).await.is_err());
    }
}
