//! Contract tests for the in-memory tracking store.
//!
//! These pin the behavior the webhook pipeline and the reaper rely on:
//! atomic record visibility, idempotent removal, and the lock lease.

use std::time::Duration;

use regsweep::store::{now_millis, MemoryStore, TrackingStore};

#[tokio::test]
async fn track_and_read_back_all_fields() {
    let store = MemoryStore::new();
    let expires = now_millis() + 3_600_000;

    store
        .track_image("myapp:1h", expires, 16_000, "sha256:abc")
        .await
        .unwrap();

    assert_eq!(store.get_expiry("myapp:1h").await.unwrap(), Some(expires));
    assert_eq!(store.get_image_size("myapp:1h").await.unwrap(), Some(16_000));
    assert_eq!(
        store.get_image_digest("myapp:1h").await.unwrap(),
        Some("sha256:abc".to_string())
    );

    let created = store
        .get_created_timestamp("myapp:1h")
        .await
        .unwrap()
        .unwrap();
    assert!(created <= now_millis());
    assert!(created > now_millis() - 5_000);
}

#[tokio::test]
async fn missing_keys_read_as_none() {
    let store = MemoryStore::new();
    assert_eq!(store.get_expiry("ghost:1h").await.unwrap(), None);
    assert_eq!(store.get_image_size("ghost:1h").await.unwrap(), None);
    assert_eq!(store.get_image_digest("ghost:1h").await.unwrap(), None);
    assert_eq!(store.get_created_timestamp("ghost:1h").await.unwrap(), None);
}

#[tokio::test]
async fn track_overwrites_existing_record() {
    let store = MemoryStore::new();
    store
        .track_image("myapp:1h", 1000, 100, "sha256:old")
        .await
        .unwrap();
    store
        .track_image("myapp:1h", 2000, 200, "sha256:new")
        .await
        .unwrap();

    assert_eq!(store.get_expiry("myapp:1h").await.unwrap(), Some(2000));
    assert_eq!(store.get_image_size("myapp:1h").await.unwrap(), Some(200));
    assert_eq!(
        store.get_image_digest("myapp:1h").await.unwrap(),
        Some("sha256:new".to_string())
    );
    assert_eq!(store.image_count().await.unwrap(), 1);
}

#[tokio::test]
async fn list_images_has_no_duplicates() {
    let store = MemoryStore::new();
    store.track_image("a:1h", 1, 1, "").await.unwrap();
    store.track_image("b:1h", 1, 1, "").await.unwrap();
    store.track_image("a:1h", 2, 2, "").await.unwrap();

    let mut images = store.list_images().await.unwrap();
    images.sort();
    assert_eq!(images, vec!["a:1h".to_string(), "b:1h".to_string()]);
    assert_eq!(store.image_count().await.unwrap(), 2);
}

#[tokio::test]
async fn remove_is_idempotent() {
    let store = MemoryStore::new();
    store.track_image("a:1h", 1, 1, "").await.unwrap();

    store.remove_image("a:1h").await.unwrap();
    store.remove_image("a:1h").await.unwrap();
    store.remove_image("never-existed:1h").await.unwrap();

    assert_eq!(store.image_count().await.unwrap(), 0);
    assert_eq!(store.get_expiry("a:1h").await.unwrap(), None);
}

#[tokio::test]
async fn reaper_lock_is_exclusive_until_released() {
    let store = MemoryStore::new();
    let lease = Duration::from_secs(300);

    assert!(store.acquire_reaper_lock(lease).await.unwrap());
    assert!(!store.acquire_reaper_lock(lease).await.unwrap());

    store.release_reaper_lock().await.unwrap();
    assert!(store.acquire_reaper_lock(lease).await.unwrap());
}

#[tokio::test]
async fn reaper_lock_lease_expires() {
    let store = MemoryStore::new();

    assert!(store
        .acquire_reaper_lock(Duration::from_millis(30))
        .await
        .unwrap());
    assert!(!store
        .acquire_reaper_lock(Duration::from_millis(30))
        .await
        .unwrap());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store
        .acquire_reaper_lock(Duration::from_millis(30))
        .await
        .unwrap());
}

#[tokio::test]
async fn release_without_holding_is_silent() {
    let store = MemoryStore::new();
    store.release_reaper_lock().await.unwrap();
}

#[tokio::test]
async fn initialization_sentinel_round_trip() {
    let store = MemoryStore::new();
    assert!(!store.is_initialized().await.unwrap());
    store.set_initialized().await.unwrap();
    assert!(store.is_initialized().await.unwrap());
}
