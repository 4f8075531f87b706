//! Loading a static schedule from a GTFS feed.
//!
//! Parsing is delegated to `gtfs-structures`; this module converts its model
//! into [`ScheduleRecords`] and hands them to [`ScheduleIndex::build`] for
//! validation. A feed is read from a local path or downloaded from an
//! `http(s)` URL.

use std::fmt;
use std::path::{Path, PathBuf};

use gtfs_structures::{DirectionType, Exception, Gtfs, LocationType, RouteType};
use tracing::{debug, info};

use crate::domain::ServiceTime;

use super::error::LoadError;
use super::index::ScheduleIndex;
use super::records::{
    Agency, Calendar, CalendarDate, ExceptionType, Route, ScheduleRecords, Stop, StopTime, Trip,
};

/// Where the static feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GtfsSource {
    /// Zip archive or unpacked directory on disk
    Path(PathBuf),
    /// Zip archive served over HTTP(S)
    Url(String),
}

impl GtfsSource {
    /// Treat `http://` and `https://` values as URLs, anything else as a path.
    pub fn parse(raw: &str) -> Self {
        let scheme = raw.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("http" | "https") => Self::Url(raw.to_string()),
            _ => Self::Path(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for GtfsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GtfsSource::Path(path) => write!(f, "{}", path.display()),
            GtfsSource::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Load and index the feed at `source`.
///
/// Disk reads and index building run on the blocking pool.
pub async fn load_gtfs_from(source: &GtfsSource) -> Result<ScheduleIndex, LoadError> {
    match source {
        GtfsSource::Path(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || load_gtfs(path)).await?
        }
        GtfsSource::Url(url) => {
            let gtfs = Gtfs::from_url_async(url.as_str()).await?;
            let records = records_from_gtfs(gtfs);
            info!(
                url = %url,
                stops = records.stops.len(),
                trips = records.trips.len(),
                stop_times = records.stop_times.len(),
                "Downloaded GTFS feed"
            );
            tokio::task::spawn_blocking(move || ScheduleIndex::build(records)).await?
        }
    }
}

/// Read a GTFS zip archive or unpacked directory and build the index.
///
/// This is blocking; call it from `spawn_blocking` inside a runtime.
pub fn load_gtfs(path: impl AsRef<Path>) -> Result<ScheduleIndex, LoadError> {
    let path = path.as_ref();
    let gtfs = Gtfs::new(&path.to_string_lossy())?;
    let records = records_from_gtfs(gtfs);
    info!(
        path = %path.display(),
        stops = records.stops.len(),
        trips = records.trips.len(),
        stop_times = records.stop_times.len(),
        "Loaded GTFS feed"
    );
    ScheduleIndex::build(records)
}

/// Convert a parsed feed into plain schedule records.
pub fn records_from_gtfs(gtfs: Gtfs) -> ScheduleRecords {
    let agencies = gtfs
        .agencies
        .into_iter()
        .map(|a| Agency {
            id: a.id,
            name: a.name,
            timezone: a.timezone,
        })
        .collect();

    let stops = gtfs
        .stops
        .into_values()
        .map(|s| Stop {
            id: s.id.clone(),
            code: s.code.clone(),
            name: s.name.clone(),
            latitude: s.latitude,
            longitude: s.longitude,
            parent_station: s.parent_station.clone(),
            location_type: location_type_code(&s.location_type),
        })
        .collect();

    let routes = gtfs
        .routes
        .into_values()
        .map(|r| Route {
            id: r.id,
            agency_id: r.agency_id,
            short_name: r.short_name,
            long_name: r.long_name,
            route_type: route_type_code(r.route_type),
            color: Some(hex_color(r.color.r, r.color.g, r.color.b)),
            text_color: Some(hex_color(r.text_color.r, r.text_color.g, r.text_color.b)),
        })
        .collect();

    let mut trips = Vec::with_capacity(gtfs.trips.len());
    let mut stop_times = Vec::new();
    for (_, trip) in gtfs.trips {
        for st in &trip.stop_times {
            let (arrival, departure) = match (st.arrival_time, st.departure_time) {
                (Some(a), Some(d)) => (a, d),
                (Some(a), None) => (a, a),
                (None, Some(d)) => (d, d),
                (None, None) => {
                    debug!(
                        trip_id = %trip.id,
                        stop_sequence = st.stop_sequence,
                        "Skipping untimed stop time"
                    );
                    continue;
                }
            };
            stop_times.push(StopTime {
                trip_id: trip.id.clone(),
                stop_id: st.stop.id.clone(),
                stop_sequence: u32::from(st.stop_sequence),
                arrival_time: ServiceTime::from_secs(arrival),
                departure_time: ServiceTime::from_secs(departure),
                stop_headsign: st.stop_headsign.clone(),
            });
        }
        trips.push(Trip {
            id: trip.id,
            route_id: trip.route_id,
            service_id: trip.service_id,
            headsign: trip.trip_headsign,
            short_name: trip.trip_short_name,
            direction_id: trip.direction_id.map(|d| match d {
                DirectionType::Outbound => 0,
                DirectionType::Inbound => 1,
            }),
            block_id: trip.block_id,
            shape_id: trip.shape_id,
        });
    }

    let calendars = gtfs
        .calendar
        .into_values()
        .map(|c| Calendar {
            service_id: c.id,
            monday: c.monday,
            tuesday: c.tuesday,
            wednesday: c.wednesday,
            thursday: c.thursday,
            friday: c.friday,
            saturday: c.saturday,
            sunday: c.sunday,
            start_date: c.start_date,
            end_date: c.end_date,
        })
        .collect();

    let calendar_dates = gtfs
        .calendar_dates
        .into_values()
        .flatten()
        .map(|cd| CalendarDate {
            service_id: cd.service_id,
            date: cd.date,
            exception_type: match cd.exception_type {
                Exception::Added => ExceptionType::Added,
                Exception::Deleted => ExceptionType::Removed,
            },
        })
        .collect();

    ScheduleRecords {
        agencies,
        stops,
        routes,
        trips,
        stop_times,
        calendars,
        calendar_dates,
    }
}

fn location_type_code(location_type: &LocationType) -> u8 {
    match location_type {
        LocationType::StopPoint => 0,
        LocationType::StopArea => 1,
        LocationType::StationEntrance => 2,
        LocationType::GenericNode => 3,
        LocationType::BoardingArea => 4,
        LocationType::Unknown(code) => u8::try_from(*code).unwrap_or(0),
    }
}

fn route_type_code(route_type: RouteType) -> i32 {
    match route_type {
        RouteType::Tramway => 0,
        RouteType::Subway => 1,
        RouteType::Rail => 2,
        RouteType::Bus => 3,
        RouteType::Ferry => 4,
        RouteType::CableCar => 5,
        RouteType::Gondola => 6,
        RouteType::Funicular => 7,
        RouteType::Coach => 200,
        RouteType::Air => 1100,
        RouteType::Taxi => 1500,
        RouteType::Other(code) => i32::from(code),
    }
}

fn hex_color(r: u8, g: u8, b: u8) -> String {
    format!("{r:02X}{g:02X}{b:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn feed_files(agency_tz: &str) -> Vec<(&'static str, String)> {
        vec![
            (
                "agency.txt",
                format!(
                    "agency_id,agency_name,agency_url,agency_timezone\n\
                     HT,Harbour Transit,https://example.org,{agency_tz}\n"
                ),
            ),
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 S1,Main St,44.65,-63.57\n\
                 S2,Harbour,44.64,-63.56\n"
                    .to_string(),
            ),
            (
                "routes.txt",
                "route_id,agency_id,route_short_name,route_long_name,route_type,route_color\n\
                 R1,HT,1,Harbourside,3,FF8800\n"
                    .to_string(),
            ),
            (
                "trips.txt",
                "route_id,service_id,trip_id,trip_headsign,direction_id\n\
                 R1,WK,T1,Harbour,0\n\
                 R1,WK,TN,Harbour,1\n"
                    .to_string(),
            ),
            (
                "stop_times.txt",
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                 T1,08:10:00,08:10:00,S1,1\n\
                 T1,08:20:00,08:21:00,S2,2\n\
                 TN,25:30:00,25:30:00,S1,1\n"
                    .to_string(),
            ),
            (
                "calendar.txt",
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                 WK,1,1,1,1,1,0,0,20240101,20241231\n"
                    .to_string(),
            ),
            (
                "calendar_dates.txt",
                "service_id,date,exception_type\n\
                 WK,20240401,2\n"
                    .to_string(),
            ),
        ]
    }

    fn write_feed(dir: &Path, agency_tz: &str) {
        for (name, body) in feed_files(agency_tz) {
            fs::write(dir.join(name), body).unwrap();
        }
    }

    fn zipped_feed(agency_tz: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in feed_files(agency_tz) {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Serve `body` at `/gtfs.zip` on an ephemeral local port.
    async fn serve_zip(body: Vec<u8>) -> String {
        use axum::{Router, routing::get};

        let app = Router::new().route(
            "/gtfs.zip",
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[test]
    fn loads_directory_feed() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "America/Halifax");

        let index = load_gtfs(dir.path()).unwrap();
        assert_eq!(index.timezone(), chrono_tz::America::Halifax);
        assert_eq!(index.route("R1").unwrap().color.as_deref(), Some("FF8800"));
        assert_eq!(index.trip("TN").unwrap().direction_id, Some(1));

        let t1_s2 = index.stop_time_for_trip_and_stop("T1", "S2").unwrap();
        assert_eq!(t1_s2.arrival_time, ServiceTime::from_hms(8, 20, 0));
        assert_eq!(t1_s2.departure_time, ServiceTime::from_hms(8, 21, 0));

        let tn = index.stop_times_for_trip("TN");
        assert_eq!(tn.len(), 1);
        assert_eq!(tn[0].departure_time, ServiceTime::from_hms(25, 30, 0));

        let monday = chrono::NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert!(!index.active_services_for_date(monday).contains("WK"));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "Nowhere/Special");
        assert!(matches!(
            load_gtfs(dir.path()),
            Err(LoadError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn source_parsing() {
        assert_eq!(
            GtfsSource::parse("https://example.org/gtfs.zip"),
            GtfsSource::Url("https://example.org/gtfs.zip".into())
        );
        assert_eq!(
            GtfsSource::parse("HTTP://example.org/gtfs.zip"),
            GtfsSource::Url("HTTP://example.org/gtfs.zip".into())
        );
        assert_eq!(
            GtfsSource::parse("/data/google_transit.zip"),
            GtfsSource::Path(PathBuf::from("/data/google_transit.zip"))
        );
        assert_eq!(
            GtfsSource::parse("ftp://example.org/gtfs.zip"),
            GtfsSource::Path(PathBuf::from("ftp://example.org/gtfs.zip"))
        );
    }

    #[tokio::test]
    async fn loads_path_source() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "America/Halifax");

        let source = GtfsSource::Path(dir.path().to_path_buf());
        let index = load_gtfs_from(&source).await.unwrap();
        assert_eq!(index.trip_count(), 2);
    }

    #[tokio::test]
    async fn downloads_zip_from_url() {
        let base = serve_zip(zipped_feed("America/Halifax")).await;

        let source = GtfsSource::parse(&format!("{base}/gtfs.zip"));
        assert!(matches!(source, GtfsSource::Url(_)));

        let index = load_gtfs_from(&source).await.unwrap();
        assert_eq!(index.timezone(), chrono_tz::America::Halifax);
        assert_eq!(index.stop_count(), 2);
        assert_eq!(
            index.stop_time_for_trip_and_stop("TN", "S1").unwrap().departure_time,
            ServiceTime::from_hms(25, 30, 0)
        );
    }

    #[tokio::test]
    async fn downloaded_feed_is_validated() {
        let base = serve_zip(zipped_feed("Nowhere/Special")).await;
        let source = GtfsSource::Url(format!("{base}/gtfs.zip"));
        assert!(matches!(
            load_gtfs_from(&source).await,
            Err(LoadError::UnknownTimezone(_))
        ));
    }

    #[tokio::test]
    async fn missing_url_is_an_error() {
        let base = serve_zip(zipped_feed("America/Halifax")).await;
        let source = GtfsSource::Url(format!("{base}/elsewhere.zip"));
        assert!(load_gtfs_from(&source).await.is_err());
    }

    #[test]
    fn missing_feed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_gtfs(dir.path().join("absent.zip")).is_err());
    }
}
