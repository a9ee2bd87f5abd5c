//! Registry webhook ingestion.
//!
//! The registry posts an envelope of events after each push. Push events are
//! turned into tracking records: TTL derived from the tag, manifest metadata
//! fetched best-effort, overwrite policy applied, record committed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{RegsweepError, Result};
use crate::immutability::TagImmutability;
use crate::metrics::Metrics;
use crate::registry::RegistryClient;
use crate::store::{now_millis, TrackingStore};
use crate::ttl::{clamp_ttl, parse_ttl};

/// A single event from the registry notification envelope. Unknown fields
/// are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RegistryEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub target: EventTarget,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventTarget {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub events: Vec<RegistryEvent>,
}

pub struct HookHandler {
    store: Arc<dyn TrackingStore>,
    registry: Arc<dyn RegistryClient>,
    metrics: Arc<Metrics>,
    hook_token: String,
    default_ttl: Duration,
    max_ttl: Duration,
    immutability: TagImmutability,
}

impl HookHandler {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        registry: Arc<dyn RegistryClient>,
        metrics: Arc<Metrics>,
        hook_token: String,
        default_ttl: Duration,
        max_ttl: Duration,
        immutability: TagImmutability,
    ) -> Self {
        HookHandler {
            store,
            registry,
            metrics,
            hook_token,
            default_ttl,
            max_ttl,
            immutability,
        }
    }

    async fn handle_push(&self, repo: &str, tag: &str) -> Result<()> {
        let key = format!("{}:{}", repo, tag);
        let ttl = clamp_ttl(parse_ttl(tag), self.default_ttl, self.max_ttl);
        let expires_at_ms = now_millis() + ttl.as_millis() as i64;

        // Manifest metadata is best effort: a push is tracked even when the
        // registry cannot be queried for size and digest.
        let (size_bytes, digest) = match self.registry.get_manifest_info(repo, tag).await {
            Ok(info) => (info.size_bytes, info.digest),
            Err(e) => {
                warn!(
                    image = %key,
                    error = %e,
                    "failed to fetch manifest info, tracking without digest"
                );
                self.metrics.digest_fetch_errors_total.inc();
                self.metrics.image_size_fetch_errors_total.inc();
                (0, String::new())
            }
        };

        if !digest.is_empty() {
            self.detect_overwrite(&key, repo, tag, &digest).await?;
        }

        info!(
            image = %key,
            ttl = %humantime::format_duration(ttl),
            expires_at_ms,
            size_bytes,
            digest = %digest,
            "tracking image"
        );

        self.store
            .track_image(&key, expires_at_ms, size_bytes, &digest)
            .await?;

        self.metrics.images_tracked_total.inc();
        self.metrics.tracked_bytes_total.add(size_bytes);
        self.metrics.image_size_bytes.observe(size_bytes as f64);

        Ok(())
    }

    /// Check whether this push replaces existing content under the same tag.
    /// Returns an error only when the tag is immutable and the digest changed;
    /// everything else is observability.
    async fn detect_overwrite(
        &self,
        key: &str,
        repo: &str,
        tag: &str,
        new_digest: &str,
    ) -> Result<()> {
        let existing = match self.store.get_image_digest(key).await {
            Ok(digest) => digest.unwrap_or_default(),
            Err(e) => {
                warn!(image = %key, error = %e, "failed to check existing digest (non-critical)");
                return Ok(());
            }
        };

        // Empty: first push or a record from before digests were stored.
        if existing.is_empty() || existing == new_digest {
            return Ok(());
        }

        warn!(
            image = %key,
            old_digest = %existing,
            new_digest = %new_digest,
            "tag overwrite detected"
        );
        self.metrics
            .tag_overwrites_total
            .with_label_values(&[repo])
            .inc();

        if let Ok(Some(created_ms)) = self.store.get_created_timestamp(key).await {
            if created_ms > 0 {
                let age_secs = ((now_millis() - created_ms).max(0)) as f64 / 1000.0;
                self.metrics.overwritten_image_age_seconds.observe(age_secs);
            }
        }

        if self.immutability.is_immutable(tag) {
            error!(
                image = %key,
                tag = %tag,
                old_digest = %existing,
                new_digest = %new_digest,
                "immutable tag overwrite rejected"
            );
            self.metrics
                .immutable_tag_violations_total
                .with_label_values(&[repo, tag])
                .inc();
            return Err(RegsweepError::ImmutableTag {
                repo: repo.to_string(),
                tag: tag.to_string(),
            });
        }

        Ok(())
    }
}

/// `POST /v1/hook/registry-event`.
pub async fn handle_registry_event(
    State(handler): State<Arc<HookHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Token {}", handler.hook_token))
        .unwrap_or(false);
    if !authorized {
        warn!("unauthorized webhook request");
        return (StatusCode::UNAUTHORIZED, "{}").into_response();
    }

    // The registry posts a vendor content type, so the body is decoded by
    // hand rather than through a JSON extractor.
    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, "failed to decode webhook body");
            return (StatusCode::BAD_REQUEST, "bad request\n").into_response();
        }
    };

    for event in &envelope.events {
        handler
            .metrics
            .webhook_events_total
            .with_label_values(&[event.action.as_str()])
            .inc();

        if event.action != "push" {
            continue;
        }
        if event.target.repository.is_empty() || event.target.tag.is_empty() {
            continue;
        }

        if let Err(e) = handler
            .handle_push(&event.target.repository, &event.target.tag)
            .await
        {
            error!(
                image = %event.target.repository,
                tag = %event.target.tag,
                error = %e,
                "failed to handle push event"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable\n").into_response();
        }
    }

    (StatusCode::OK, "{}").into_response()
}
