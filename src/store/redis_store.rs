//! Redis-backed tracking store.
//!
//! Layout: `image:<key>` hash {expires_at, size_bytes, digest, created_at},
//! `images` set of tracked keys, `reaper:lock` string with a PX lease.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{now_millis, TrackingStore};
use crate::error::Result;

const IMAGES_INDEX: &str = "images";
const REAPER_LOCK: &str = "reaper:lock";
const INIT_SENTINEL: &str = "initialized";

const FIELD_EXPIRES_AT: &str = "expires_at";
const FIELD_SIZE_BYTES: &str = "size_bytes";
const FIELD_DIGEST: &str = "digest";
const FIELD_CREATED_AT: &str = "created_at";

fn record_key(key: &str) -> String {
    format!("image:{}", key)
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    lock_holder: String,
}

impl RedisStore {
    /// Connect and build a managed connection that reconnects on failure.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisStore {
            conn,
            lock_holder: format!("regsweep-{}", std::process::id()),
        })
    }

    async fn hget_field<T: redis::FromRedisValue>(&self, key: &str, field: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<T> = conn.hget(record_key(key), field).await?;
        Ok(value)
    }
}

#[async_trait]
impl TrackingStore for RedisStore {
    async fn track_image(
        &self,
        key: &str,
        expires_at_ms: i64,
        size_bytes: i64,
        digest: &str,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .hset_multiple(
                record_key(key),
                &[
                    (FIELD_EXPIRES_AT, expires_at_ms.to_string()),
                    (FIELD_SIZE_BYTES, size_bytes.to_string()),
                    (FIELD_DIGEST, digest.to_string()),
                    (FIELD_CREATED_AT, now_millis().to_string()),
                ],
            )
            .ignore()
            .sadd(IMAGES_INDEX, key)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_expiry(&self, key: &str) -> Result<Option<i64>> {
        self.hget_field(key, FIELD_EXPIRES_AT).await
    }

    async fn get_image_size(&self, key: &str) -> Result<Option<i64>> {
        self.hget_field(key, FIELD_SIZE_BYTES).await
    }

    async fn get_image_digest(&self, key: &str) -> Result<Option<String>> {
        self.hget_field(key, FIELD_DIGEST).await
    }

    async fn get_created_timestamp(&self, key: &str) -> Result<Option<i64>> {
        self.hget_field(key, FIELD_CREATED_AT).await
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.smembers(IMAGES_INDEX).await?;
        Ok(keys)
    }

    async fn image_count(&self) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.scard(IMAGES_INDEX).await?;
        Ok(count)
    }

    async fn remove_image(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(record_key(key))
            .ignore()
            .srem(IMAGES_INDEX, key)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn acquire_reaper_lock(&self, lease: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET NX PX: the lease bounds how long a crashed holder keeps the lock.
        let reply: Option<String> = redis::cmd("SET")
            .arg(REAPER_LOCK)
            .arg(&self.lock_holder)
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release_reaper_lock(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        // Advisory release: correctness never depends on exclusivity, so a
        // plain DEL is enough even if the lease already expired.
        let _: () = conn.del(REAPER_LOCK).await?;
        Ok(())
    }

    async fn is_initialized(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(INIT_SENTINEL).await?;
        Ok(exists)
    }

    async fn set_initialized(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(INIT_SENTINEL, now_millis()).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
