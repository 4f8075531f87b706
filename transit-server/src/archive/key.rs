//! Archive key scheme.
//!
//! Keys look like
//! `TripUpdates/2024/03/15/11/TripUpdates-2024-03-15T11-10-05Z.pb`, optionally
//! with a trailing `.gz`. All components are UTC and zero padded, so sorting
//! keys lexicographically sorts them chronologically.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::realtime::FeedKind;

pub const PB_EXT: &str = ".pb";
pub const GZ_EXT: &str = ".gz";

const DIR_FORMAT: &str = "%Y/%m/%d/%H";
const FILE_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";
const MINUTE_FORMAT: &str = "%Y-%m-%dT%H-%M";

/// Directory part of a key: `kind/YYYY/MM/DD/HH`.
pub fn hour_dir(kind: FeedKind, at: DateTime<Utc>) -> String {
    format!("{kind}/{}", at.format(DIR_FORMAT))
}

/// Key of an uncompressed snapshot taken at `at`.
pub fn snapshot_key(kind: FeedKind, at: DateTime<Utc>) -> String {
    format!("{}/{kind}-{}{PB_EXT}", hour_dir(kind, at), at.format(FILE_FORMAT))
}

/// Prefix shared by every key in `at`'s minute.
pub fn minute_prefix(kind: FeedKind, at: DateTime<Utc>) -> String {
    format!("{}/{kind}-{}", hour_dir(kind, at), at.format(MINUTE_FORMAT))
}

/// Whether the stored bytes under `key` are gzip compressed.
pub fn is_compressed(key: &str) -> bool {
    key.ends_with(GZ_EXT)
}

/// Recover the snapshot instant from a key's file name.
pub fn key_time(key: &str) -> Option<DateTime<Utc>> {
    let file = key.rsplit('/').next()?;
    let file = file.strip_suffix(GZ_EXT).unwrap_or(file);
    let stem = file.strip_suffix(PB_EXT)?;
    let (_, stamp) = stem.split_once('-')?;
    NaiveDateTime::parse_from_str(stamp, FILE_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}
