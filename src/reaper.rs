//! Periodic sweep that deletes expired images from the registry and
//! reconciles the tracking store.
//!
//! Deletion is at-least-once: a crash between the registry delete and the
//! record removal leaves a dangling record, and the next cycle finalizes it
//! through the 404-tolerant delete path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::REAPER_LOCK_LEASE;
use crate::error::{RegsweepError, Result};
use crate::metrics::Metrics;
use crate::registry::RegistryClient;
use crate::store::{now_millis, TrackingStore};

pub struct Reaper {
    store: Arc<dyn TrackingStore>,
    registry: Arc<dyn RegistryClient>,
    metrics: Arc<Metrics>,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        registry: Arc<dyn RegistryClient>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Reaper {
            store,
            registry,
            metrics,
        }
    }

    /// Tick at `interval` until the token is cancelled. Cycle errors are
    /// logged, never propagated.
    pub async fn run_loop(&self, interval: Duration, shutdown: CancellationToken) {
        info!(
            interval = %humantime::format_duration(interval),
            "starting reaper loop"
        );

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("reaper loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reap_once(&shutdown).await {
                        error!(error = %e, "reap cycle failed");
                    }
                }
            }
        }
    }

    /// One full pass over the tracked set, guarded by the store lock so only
    /// one replica sweeps at a time.
    pub async fn reap_once(&self, shutdown: &CancellationToken) -> Result<()> {
        let acquired = match self.store.acquire_reaper_lock(REAPER_LOCK_LEASE).await {
            Ok(acquired) => acquired,
            Err(e) => {
                self.metrics.reaper_cycle_errors_total.inc();
                return Err(e);
            }
        };
        if !acquired {
            debug!("another replica holds the reaper lock, skipping");
            return Ok(());
        }

        let start = Instant::now();
        let result = self.run_cycle(shutdown).await;
        self.metrics
            .reaper_cycle_duration_seconds
            .observe(start.elapsed().as_secs_f64());

        if let Err(e) = self.store.release_reaper_lock().await {
            warn!(error = %e, "failed to release reaper lock");
        }

        result
    }

    async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<()> {
        let images = match self.store.list_images().await {
            Ok(images) => images,
            Err(e) => {
                self.metrics.reaper_cycle_errors_total.inc();
                return Err(e);
            }
        };

        info!(total_images = images.len(), "reap cycle starting");
        self.metrics.tracked_images.set(images.len() as i64);

        let now = now_millis();

        for key in &images {
            if shutdown.is_cancelled() {
                info!("reap cycle interrupted by shutdown");
                return Ok(());
            }

            let expires_at = match self.store.get_expiry(key).await {
                Ok(Some(ms)) => ms,
                Ok(None) => {
                    warn!(image = %key, "record without expiry, cleaning up");
                    let _ = self.store.remove_image(key).await;
                    continue;
                }
                Err(e) => {
                    warn!(image = %key, error = %e, "failed to get expiry, cleaning up");
                    let _ = self.store.remove_image(key).await;
                    continue;
                }
            };

            if expires_at > now {
                debug!(
                    image = %key,
                    remaining_secs = (expires_at - now) / 1000,
                    "image not expired yet"
                );
                continue;
            }

            // Size read is best effort; it only feeds storage accounting.
            let size_bytes = match self.store.get_image_size(key).await {
                Ok(Some(size)) => size,
                Ok(None) => 0,
                Err(e) => {
                    warn!(image = %key, error = %e, "failed to get image size for metrics");
                    0
                }
            };

            if let Err(e) = self.delete_image(key).await {
                error!(image = %key, error = %e, "failed to delete image");
                continue;
            }

            self.metrics.images_reaped_total.inc();
            self.metrics
                .bytes_reclaimed_total
                .inc_by(size_bytes.max(0) as u64);
            self.metrics.tracked_bytes_total.sub(size_bytes);

            info!(image = %key, size_bytes, "reaped expired image");
        }

        Ok(())
    }

    async fn delete_image(&self, key: &str) -> Result<()> {
        let Some((repo, tag)) = key.split_once(':') else {
            // Keys the index cannot explain are dropped so they stop
            // resurfacing every cycle.
            let _ = self.store.remove_image(key).await;
            return Err(RegsweepError::Registry(format!(
                "invalid image key: {}",
                key
            )));
        };

        self.registry.delete_manifest(repo, tag).await?;
        self.store.remove_image(key).await
    }
}
