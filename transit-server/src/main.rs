use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transit_server::archive::{
    ArchiveBackend, ArchiveCacheConfig, Archiver, ArchiverConfig, CachedArchive, FsArchive,
    MemoryArchive,
};
use transit_server::config::ServerConfig;
use transit_server::live::LiveFeedCache;
use transit_server::planner::PlannerConfig;
use transit_server::realtime::{FeedClient, FeedClientConfig};
use transit_server::reconcile::ReconcileConfig;
use transit_server::schedule::load_gtfs_from;
use transit_server::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // Load the static schedule (fail fast if it is unusable)
    let schedule = match load_gtfs_from(&config.gtfs).await {
        Ok(schedule) => Arc::new(schedule),
        Err(e) => {
            error!(source = %config.gtfs, error = %e, "Failed to load GTFS");
            return ExitCode::FAILURE;
        }
    };
    info!(
        stops = schedule.stop_count(),
        trips = schedule.trip_count(),
        timezone = %schedule.timezone(),
        "Loaded schedule"
    );

    // Start live feed polling
    let client = match FeedClient::new(FeedClientConfig::default()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to create feed client");
            return ExitCode::FAILURE;
        }
    };
    let feed = LiveFeedCache::new(config.feed.clone());
    if feed.config().configured_kinds().next().is_none() {
        warn!("No live feed URLs configured; departures will be schedule only");
    }
    let feed_task = feed.start(client);

    // Snapshot archive
    let archive = Arc::new(match &config.archive_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using filesystem archive");
            ArchiveBackend::Fs(CachedArchive::new(
                FsArchive::new(dir),
                &ArchiveCacheConfig::default(),
            ))
        }
        None => {
            info!("Using in-memory archive");
            ArchiveBackend::Memory(MemoryArchive::new())
        }
    });
    let archive_task = config.archive_enabled.then(|| {
        Arc::new(Archiver::new(
            Arc::clone(&archive),
            feed.clone(),
            ArchiverConfig::default(),
        ))
        .start()
    });

    let state = AppState::new(
        schedule,
        feed,
        archive,
        PlannerConfig::default(),
        ReconcileConfig::default(),
    );
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.bind_addr, "Ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let Some(task) = archive_task {
        task.stop().await;
    }
    feed_task.stop().await;

    match served {
        Ok(()) => {
            info!("Shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
