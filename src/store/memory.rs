//! In-memory tracking store for tests and single-process development runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{now_millis, TrackingStore};
use crate::error::Result;

#[derive(Debug, Clone)]
struct ImageRecord {
    expires_at_ms: i64,
    size_bytes: i64,
    digest: String,
    created_at_ms: i64,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, ImageRecord>,
    lock_expires_at: Option<Instant>,
    initialized: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn track_image(
        &self,
        key: &str,
        expires_at_ms: i64,
        size_bytes: i64,
        digest: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(
            key.to_string(),
            ImageRecord {
                expires_at_ms,
                size_bytes,
                digest: digest.to_string(),
                created_at_ms: now_millis(),
            },
        );
        Ok(())
    }

    async fn get_expiry(&self, key: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(key).map(|r| r.expires_at_ms))
    }

    async fn get_image_size(&self, key: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(key).map(|r| r.size_bytes))
    }

    async fn get_image_digest(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(key).map(|r| r.digest.clone()))
    }

    async fn get_created_timestamp(&self, key: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(key).map(|r| r.created_at_ms))
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.keys().cloned().collect())
    }

    async fn image_count(&self) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.len() as i64)
    }

    async fn remove_image(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.remove(key);
        Ok(())
    }

    async fn acquire_reaper_lock(&self, lease: Duration) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        match inner.lock_expires_at {
            Some(expires) if expires > now => Ok(false),
            _ => {
                inner.lock_expires_at = Some(now + lease);
                Ok(true)
            }
        }
    }

    async fn release_reaper_lock(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.lock_expires_at = None;
        Ok(())
    }

    async fn is_initialized(&self) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.initialized)
    }

    async fn set_initialized(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.initialized = true;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
