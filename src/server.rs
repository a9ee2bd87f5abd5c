//! HTTP surface and process assembly: router construction, store and
//! registry wiring, background reaper, graceful shutdown.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hooks::{handle_registry_event, HookHandler};
use crate::immutability::TagImmutability;
use crate::metrics::Metrics;
use crate::reaper::Reaper;
use crate::registry::{HttpRegistryClient, RegistryClient};
use crate::seed::seed_existing_images;
use crate::store::{RedisStore, TrackingStore};
use crate::web::{handle_index, LandingPage};

/// `GET /healthz`.
async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /metrics`.
async fn serve_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.encode_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable\n").into_response()
        }
    }
}

/// Assemble the full application router. Exposed so tests can drive the
/// HTTP surface against in-memory collaborators.
pub fn build_router(
    hooks: Arc<HookHandler>,
    metrics: Arc<Metrics>,
    landing: Arc<LandingPage>,
) -> Router {
    let hook_routes = Router::new()
        .route("/v1/hook/registry-event", post(handle_registry_event))
        .with_state(hooks);

    let ops_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(serve_metrics))
        .with_state(metrics);

    let web_routes = Router::new()
        .route("/", get(handle_index))
        .with_state(landing);

    hook_routes.merge(ops_routes).merge(web_routes)
}

/// Connect the store and registry, start the webhook server and the reaper
/// loop, and return a handle that resolves once both have drained after the
/// shutdown token fires.
pub async fn start_server(
    config: Config,
    shutdown: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let metrics = Arc::new(Metrics::new()?);

    let store: Arc<dyn TrackingStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    store.ping().await?;
    info!("connected to redis");

    let registry: Arc<dyn RegistryClient> =
        Arc::new(HttpRegistryClient::new(&config.registry_url)?);

    match store.image_count().await {
        Ok(count) => {
            metrics.tracked_images.set(count);
            info!(tracked_images = count, "tracking store ready");
        }
        Err(e) => warn!(error = %e, "failed to read tracked image count"),
    }

    // Backfill pre-existing registry content without blocking startup.
    {
        let store = store.clone();
        let registry = registry.clone();
        let metrics = metrics.clone();
        let default_ttl = config.default_ttl;
        let max_ttl = config.max_ttl;
        tokio::spawn(async move {
            if let Err(e) =
                seed_existing_images(store, registry, metrics, default_ttl, max_ttl).await
            {
                warn!(error = %e, "catalog seeding failed");
            }
        });
    }

    let hooks = Arc::new(HookHandler::new(
        store.clone(),
        registry.clone(),
        metrics.clone(),
        config.hook_token.clone(),
        config.default_ttl,
        config.max_ttl,
        TagImmutability::new(config.immutable_tag_patterns.clone()),
    ));

    let landing = Arc::new(LandingPage::new(
        config.hostname.clone(),
        config.default_ttl,
        config.max_ttl,
    ));

    let app = build_router(hooks, metrics.clone(), landing);

    let reaper = Reaper::new(store.clone(), registry.clone(), metrics.clone());
    let reaper_shutdown = shutdown.clone();
    let reap_interval = config.reap_interval;
    let reaper_handle = tokio::spawn(async move {
        reaper.run_loop(reap_interval, reaper_shutdown).await;
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "starting server");

    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server error");
        }
    });

    Ok(tokio::spawn(async move {
        let _ = server_handle.await;
        let _ = reaper_handle.await;
        info!("server stopped");
    }))
}
