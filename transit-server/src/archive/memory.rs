//! In-memory snapshot archive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::domain::truncate_to_minute;
use crate::realtime::{FeedKind, LiveMessage, encode_message};

use super::key;
use super::{ArchiveError, Snapshot, SnapshotArchive, key_for_message};

/// Keeps stored bytes in an ordered map keyed like the filesystem archive.
///
/// Used when no archive directory is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    reads: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under an arbitrary key.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl SnapshotArchive for MemoryArchive {
    async fn get_as_of(&self, kind: FeedKind, at: DateTime<Utc>) -> Result<Snapshot, ArchiveError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let minute = truncate_to_minute(at);
        let prefix = key::minute_prefix(kind, minute);

        let found = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .last()
                .map(|(k, v)| (k.clone(), v.clone()))
        };

        let (key, bytes) = found.ok_or(ArchiveError::NotFound { kind, minute })?;
        Snapshot::from_stored(kind, key, &bytes)
    }

    async fn put(&self, kind: FeedKind, message: &LiveMessage) -> Result<String, ArchiveError> {
        let key = key_for_message(kind, message)?;
        self.insert_raw(key.clone(), encode_message(message));
        Ok(key)
    }
}
