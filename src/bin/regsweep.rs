use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use regsweep::config::{LogFormat, SHUTDOWN_GRACE};
use regsweep::registry::HttpRegistryClient;
use regsweep::reaper::Reaper;
use regsweep::store::{RedisStore, TrackingStore};
use regsweep::{Config, Metrics, Result};

#[derive(Debug, Parser)]
#[command(name = "regsweep")]
#[command(version, about = "Ephemeral container registry sidecar")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the webhook server, reaper loop, and landing page
    Serve,
    /// Run a single reap cycle (for a CronJob or debugging)
    Reap,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("regsweep {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::from_env();
    config.validate()?;
    init_logging(config.log_format);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Reap => reap_once(config).await,
        Command::Version => unreachable!(),
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "regsweep=info".into());
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn serve(config: Config) -> Result<()> {
    let shutdown = CancellationToken::new();
    let handle = regsweep::start_server(config, shutdown.clone()).await?;

    shutdown_signal().await;
    info!("shutdown signal received");
    shutdown.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
        warn!("shutdown grace period elapsed, exiting with work in flight");
    }

    Ok(())
}

async fn reap_once(config: Config) -> Result<()> {
    let store: Arc<dyn TrackingStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    store.ping().await?;

    let registry = Arc::new(HttpRegistryClient::new(&config.registry_url)?);
    let metrics = Arc::new(Metrics::new()?);

    let reaper = Reaper::new(store, registry, metrics);
    reaper.reap_once(&CancellationToken::new()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
