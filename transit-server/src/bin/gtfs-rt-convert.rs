//! Dump a GTFS-realtime snapshot as JSON.
//!
//! Reads a `.pb` or `.pb.gz` file, or stdin when no path is given.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use transit_server::inspect::{InspectError, decode_snapshot, read_snapshot, write_json};
use transit_server::realtime::LiveMessage;

#[derive(Parser, Debug)]
#[command(name = "gtfs-rt-convert", about = "Dump a GTFS-realtime snapshot as JSON")]
struct Args {
    /// Snapshot file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Indent the output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    let message = match &args.input {
        Some(path) => read_snapshot(path),
        None => read_stdin(),
    };
    let result = message.and_then(|m| write_json(&m, args.pretty, io::stdout().lock()));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Conversion failed");
            ExitCode::FAILURE
        }
    }
}

fn read_stdin() -> Result<LiveMessage, InspectError> {
    let origin = Path::new("<stdin>");
    let mut bytes = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut bytes)
        .map_err(|source| InspectError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
    decode_snapshot(origin, &bytes)
}
