pub mod config;
pub mod error;
pub mod hooks;
pub mod immutability;
pub mod metrics;
pub mod reaper;
pub mod registry;
pub mod seed;
pub mod server;
pub mod store;
pub mod ttl;
pub mod web;

pub use config::Config;
pub use error::{RegsweepError, Result};
pub use metrics::Metrics;
pub use store::{MemoryStore, RedisStore, TrackingStore};

/// Start the webhook server with a background reaper loop, returning once
/// the listener is bound. Shutdown is driven by the passed token.
pub async fn start_server(
    config: Config,
    shutdown: tokio_util::sync::CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    server::start_server(config, shutdown).await
}
