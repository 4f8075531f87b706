//! Offline inspection of archived feed snapshots.
//!
//! Backs the `gtfs-rt-convert` and `gtfs-rt-analyze` binaries: reading a
//! snapshot file (plain or gzip), dumping it as JSON, and following how the
//! predicted times for each trip and stop move across a series of snapshots.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use flate2::read::GzDecoder;

use crate::domain::from_posix;
use crate::realtime::{FeedError, LiveMessage, StopTimeEvent, decode_message};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("decoding {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: FeedError,
    },

    #[error("writing JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode snapshot bytes, inflating them first if they are gzip.
///
/// `origin` names the source in errors.
pub fn decode_snapshot(origin: &Path, bytes: &[u8]) -> Result<LiveMessage, InspectError> {
    let decode = |raw: &[u8]| {
        decode_message(raw).map_err(|source| InspectError::Decode {
            path: origin.to_path_buf(),
            source,
        })
    };
    if !bytes.starts_with(&GZIP_MAGIC) {
        return decode(bytes);
    }
    let mut raw = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(|source| InspectError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
    decode(&raw)
}

/// Read and decode one snapshot file.
pub fn read_snapshot(path: &Path) -> Result<LiveMessage, InspectError> {
    let bytes = std::fs::read(path).map_err(|source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_snapshot(path, &bytes)
}

/// Write `message` as one line of JSON, or indented when `pretty`.
pub fn write_json(message: &LiveMessage, pretty: bool, mut out: impl Write) -> Result<(), InspectError> {
    if pretty {
        serde_json::to_writer_pretty(&mut out, message)?;
    } else {
        serde_json::to_writer(&mut out, message)?;
    }
    out.write_all(b"\n").map_err(|source| InspectError::Io {
        path: PathBuf::from("<output>"),
        source,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Arrival,
    Departure,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Arrival => write!(f, "arrival"),
            EventKind::Departure => write!(f, "departure"),
        }
    }
}

/// A prediction seen for the first time, or one that moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionChange {
    First {
        key: String,
        reported_at: Option<DateTime<Utc>>,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    },
    Moved {
        key: String,
        reported_at: Option<DateTime<Utc>>,
        event: EventKind,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl PredictionChange {
    /// Render as one line, with clock times in `tz`.
    pub fn describe(&self, tz: Tz) -> String {
        let clock = |t: &Option<DateTime<Utc>>| match t {
            Some(t) => t.with_timezone(&tz).format("%H:%M:%S").to_string(),
            None => "(unknown)".to_string(),
        };
        match self {
            PredictionChange::First {
                key,
                reported_at,
                arrival,
                departure,
            } => format!(
                "{key} first update at {} arrival {}, departure {}",
                clock(reported_at),
                clock(arrival),
                clock(departure)
            ),
            PredictionChange::Moved {
                key,
                reported_at,
                event,
                from,
                to,
            } => {
                let shift = match (from, to) {
                    (Some(from), Some(to)) => format!("{:+}s", (*to - *from).num_seconds()),
                    _ => "?".to_string(),
                };
                format!(
                    "{key} update at {} {event} was {} now {} ({shift})",
                    clock(reported_at),
                    clock(from),
                    clock(to)
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Predicted {
    arrival: Option<i64>,
    departure: Option<i64>,
}

/// Tracks the last predicted times per (start date, trip, stop).
#[derive(Debug, Default)]
pub struct PredictionLog {
    last: HashMap<String, Predicted>,
}

impl PredictionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stops being followed.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    /// Fold in the next snapshot, returning what changed since the last one.
    ///
    /// A trip update's own timestamp is the report time, falling back to the
    /// message header.
    pub fn observe(&mut self, message: &LiveMessage) -> Vec<PredictionChange> {
        let mut changes = Vec::new();
        for update in message.trip_updates() {
            let reported_at = update
                .timestamp
                .filter(|t| *t > 0)
                .or(Some(message.timestamp).filter(|t| *t > 0))
                .and_then(|t| i64::try_from(t).ok())
                .and_then(from_posix);
            let trip_key = format!(
                "{}-{}",
                update.trip.start_date.as_deref().unwrap_or_default(),
                update.trip.trip_id.as_deref().unwrap_or_default()
            );

            for stu in &update.stop_time_updates {
                let key = format!("{trip_key}-{}", stu.stop_id.as_deref().unwrap_or_default());
                let current = Predicted {
                    arrival: event_time(stu.arrival),
                    departure: event_time(stu.departure),
                };
                match self.last.insert(key.clone(), current) {
                    None => changes.push(PredictionChange::First {
                        key,
                        reported_at,
                        arrival: current.arrival.and_then(from_posix),
                        departure: current.departure.and_then(from_posix),
                    }),
                    Some(previous) => {
                        for (event, from, to) in [
                            (EventKind::Arrival, previous.arrival, current.arrival),
                            (EventKind::Departure, previous.departure, current.departure),
                        ] {
                            if from != to {
                                changes.push(PredictionChange::Moved {
                                    key: key.clone(),
                                    reported_at,
                                    event,
                                    from: from.and_then(from_posix),
                                    to: to.and_then(from_posix),
                                });
                            }
                        }
                    }
                }
            }
        }
        changes
    }
}

fn event_time(event: Option<StopTimeEvent>) -> Option<i64> {
    event.and_then(|e| e.time).filter(|t| *t > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{FeedEntity, StopTimeUpdate, TripDescriptor, TripUpdate, encode_message};
    use flate2::Compression;
    use flate2::write::GzEncoder;

    const T0: i64 = 1_710_504_000; // 2024-03-15 12:00:00Z

    fn message(header: u64, departure: Option<i64>) -> LiveMessage {
        LiveMessage {
            timestamp: header,
            entities: vec![FeedEntity {
                id: "tu-T1".into(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("T1".into()),
                        start_date: Some("20240315".into()),
                        ..Default::default()
                    },
                    stop_time_updates: vec![StopTimeUpdate {
                        stop_sequence: Some(1),
                        stop_id: Some("S1".into()),
                        departure: departure.map(|t| StopTimeEvent {
                            time: Some(t),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn reads_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();
        let msg = message(T0 as u64, Some(T0 + 300));
        let bytes = encode_message(&msg);

        let plain = dir.path().join("TripUpdates.pb");
        std::fs::write(&plain, &bytes).unwrap();
        assert_eq!(read_snapshot(&plain).unwrap(), msg);

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&bytes).unwrap();
        let packed = dir.path().join("TripUpdates.pb.gz");
        std::fs::write(&packed, gz.finish().unwrap()).unwrap();
        assert_eq!(read_snapshot(&packed).unwrap(), msg);
    }

    #[test]
    fn read_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pb");
        let err = read_snapshot(&missing).unwrap_err();
        assert!(matches!(err, InspectError::Io { .. }));
        assert!(err.to_string().contains("missing.pb"));

        let junk = dir.path().join("junk.pb");
        std::fs::write(&junk, [0xff, 0xff, 0xff]).unwrap();
        assert!(matches!(
            read_snapshot(&junk).unwrap_err(),
            InspectError::Decode { .. }
        ));
    }

    #[test]
    fn json_dump_carries_entities() {
        let mut out = Vec::new();
        write_json(&message(T0 as u64, Some(T0 + 300)), false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["timestamp"], T0);
        assert_eq!(value["entities"][0]["id"], "tu-T1");
    }

    #[test]
    fn log_reports_first_sighting_then_moves() {
        let mut log = PredictionLog::new();

        let first = log.observe(&message(T0 as u64, Some(T0 + 300)));
        assert_eq!(first.len(), 1);
        assert!(matches!(&first[0], PredictionChange::First { key, .. } if key == "20240315-T1-S1"));

        assert!(log.observe(&message(T0 as u64 + 30, Some(T0 + 300))).is_empty());

        let moved = log.observe(&message(T0 as u64 + 60, Some(T0 + 360)));
        assert_eq!(
            moved,
            vec![PredictionChange::Moved {
                key: "20240315-T1-S1".into(),
                reported_at: from_posix(T0 + 60),
                event: EventKind::Departure,
                from: from_posix(T0 + 300),
                to: from_posix(T0 + 360),
            }]
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn describe_uses_local_clock() {
        let change = PredictionChange::Moved {
            key: "20240315-T1-S1".into(),
            reported_at: from_posix(T0),
            event: EventKind::Departure,
            from: from_posix(T0 + 300),
            to: from_posix(T0 + 360),
        };
        assert_eq!(
            change.describe(chrono_tz::America::Halifax),
            "20240315-T1-S1 update at 09:00:00 departure was 09:05:00 now 09:06:00 (+60s)"
        );

        let first = PredictionChange::First {
            key: "k".into(),
            reported_at: None,
            arrival: None,
            departure: from_posix(T0),
        };
        assert_eq!(
            first.describe(chrono_tz::UTC),
            "k first update at (unknown) arrival (unknown), departure 12:00:00"
        );
    }
}
