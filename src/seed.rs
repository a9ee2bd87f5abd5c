//! Catalog seeding: backfill tracking for images that were pushed before
//! this sidecar was deployed.
//!
//! Runs once per store lifetime, guarded by the initialization sentinel.
//! Every `(repository, tag)` already in the registry is tracked with its
//! tag-derived TTL, so pre-existing images expire the same way fresh pushes
//! do.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::Metrics;
use crate::registry::RegistryClient;
use crate::store::{now_millis, TrackingStore};
use crate::ttl::{clamp_ttl, parse_ttl};

pub async fn seed_existing_images(
    store: Arc<dyn TrackingStore>,
    registry: Arc<dyn RegistryClient>,
    metrics: Arc<Metrics>,
    default_ttl: Duration,
    max_ttl: Duration,
) -> Result<()> {
    if store.is_initialized().await? {
        return Ok(());
    }

    info!("store not seeded yet, scanning registry catalog");

    let repos = registry.list_repositories().await?;
    let mut seeded = 0u64;

    for repo in &repos {
        let tags = match registry.list_tags(repo).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(repository = %repo, error = %e, "failed to list tags, skipping repository");
                continue;
            }
        };

        for tag in &tags {
            let key = format!("{}:{}", repo, tag);
            let ttl = clamp_ttl(parse_ttl(tag), default_ttl, max_ttl);
            let expires_at_ms = now_millis() + ttl.as_millis() as i64;

            let (size_bytes, digest) = match registry.get_manifest_info(repo, tag).await {
                Ok(info) => (info.size_bytes, info.digest),
                Err(e) => {
                    warn!(image = %key, error = %e, "failed to fetch manifest info while seeding");
                    (0, String::new())
                }
            };

            if let Err(e) = store
                .track_image(&key, expires_at_ms, size_bytes, &digest)
                .await
            {
                warn!(image = %key, error = %e, "failed to seed image");
                continue;
            }

            metrics.images_tracked_total.inc();
            metrics.tracked_bytes_total.add(size_bytes);
            metrics.image_size_bytes.observe(size_bytes as f64);
            seeded += 1;
        }
    }

    store.set_initialized().await?;
    info!(repositories = repos.len(), images = seeded, "catalog seeding complete");

    Ok(())
}
