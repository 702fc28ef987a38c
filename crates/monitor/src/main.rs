//! Price feed monitor
//!
//! Main entry point: evaluates the configured cross rate until interrupted

use std::env;
use std::path::PathBuf;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oracle_core::FeedSettings;
use oracle_monitor::MonitorService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting price feed monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = env::var("PRICE_FEED_CONFIG").ok().map(PathBuf::from);
    let settings = FeedSettings::load(config_path.as_deref())?;

    let mut service = match MonitorService::connect(&settings).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to construct price feed: {}", e);
            return Err(e);
        }
    };

    service.start().await;
    info!("Press Ctrl+C to shutdown");

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }

    service.stop().await;
    info!("Shutdown complete");
    Ok(())
}
