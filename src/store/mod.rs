//! Tracking store: a TTL-capable key/value surface shared by the webhook
//! pipeline and the reaper.
//!
//! The unit of tracking is an `(image, tag)` pair rendered as the opaque key
//! `"<repository>:<tag>"`. Each record carries the expiry deadline, the image
//! size, the content digest at tracking time, and the record write time. An
//! index set enumerates all tracked keys for the reaper.

mod memory;
mod redis_store;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Operations every tracking store backend provides. Field reads return
/// `Ok(None)` when the key (or field) is absent.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Upsert the record for `key` and add it to the index. The write is
    /// atomic with respect to concurrent readers: they observe either the
    /// previous record or the new one, never a partial mix.
    async fn track_image(
        &self,
        key: &str,
        expires_at_ms: i64,
        size_bytes: i64,
        digest: &str,
    ) -> Result<()>;

    async fn get_expiry(&self, key: &str) -> Result<Option<i64>>;
    async fn get_image_size(&self, key: &str) -> Result<Option<i64>>;
    async fn get_image_digest(&self, key: &str) -> Result<Option<String>>;
    async fn get_created_timestamp(&self, key: &str) -> Result<Option<i64>>;

    /// Snapshot of the index. Order is unspecified; no duplicates.
    async fn list_images(&self) -> Result<Vec<String>>;

    async fn image_count(&self) -> Result<i64>;

    /// Remove record and index entry. Idempotent.
    async fn remove_image(&self, key: &str) -> Result<()>;

    /// Try to take the reaper lock for `lease`. Non-blocking; `false` means
    /// another holder currently owns it.
    async fn acquire_reaper_lock(&self, lease: Duration) -> Result<bool>;

    /// Drop the reaper lock. Silent when not held or already expired.
    async fn release_reaper_lock(&self) -> Result<()>;

    async fn is_initialized(&self) -> Result<bool>;
    async fn set_initialized(&self) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}
