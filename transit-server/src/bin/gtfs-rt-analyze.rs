//! Follow predicted times across a series of trip update snapshots.
//!
//! Snapshot paths come from the command line, or one per line on stdin, and
//! are read in the order given. Each first sighting and each moved arrival or
//! departure prediction is printed as one line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono_tz::Tz;
use clap::Parser;
use tracing::{error, info};

use transit_server::inspect::{PredictionLog, read_snapshot};

#[derive(Parser, Debug)]
#[command(name = "gtfs-rt-analyze", about = "Report prediction changes across snapshots")]
struct Args {
    /// Snapshot files in order; read from stdin when omitted
    files: Vec<PathBuf>,

    /// IANA timezone for printed clock times
    #[arg(long, default_value = "UTC")]
    timezone: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    let tz: Tz = match args.timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            error!(timezone = %args.timezone, "Unknown timezone");
            return ExitCode::FAILURE;
        }
    };

    let files = if args.files.is_empty() {
        match io::stdin().lock().lines().collect::<Result<Vec<_>, _>>() {
            Ok(lines) => lines
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to read file list");
                return ExitCode::FAILURE;
            }
        }
    } else {
        args.files
    };

    let mut log = PredictionLog::new();
    let mut out = io::stdout().lock();
    for path in &files {
        let message = match read_snapshot(path) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to read snapshot");
                return ExitCode::FAILURE;
            }
        };
        for change in log.observe(&message) {
            if let Err(e) = writeln!(out, "{}", change.describe(tz)) {
                error!(error = %e, "Failed to write output");
                return ExitCode::FAILURE;
            }
        }
    }

    info!(snapshots = files.len(), stops = log.len(), "Done");
    ExitCode::SUCCESS
}
