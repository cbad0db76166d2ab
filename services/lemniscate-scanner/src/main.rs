//! Lemniscate Scanner - composite technical scoring over an equity universe.
//!
//! Serves scan, score and weekly snapshot routes over HTTP.

use anyhow::Result;
use lemniscate_common::config::Config;
use lemniscate_common::logging::init_logging_with_exclusions;
use lemniscate_scanner::ScannerServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration (file, then LEMNISCATE_* overrides)
    let config = Config::load_with_env()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    config.validate()?;

    tracing::info!("Lemniscate Scanner v{}", env!("CARGO_PKG_VERSION"));

    let server = ScannerServer::from_config(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    server.start().await
}
