//! Catalog seeding tests: backfilling tracking records for images that
//! existed before the sidecar was deployed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use regsweep::error::{RegsweepError, Result};
use regsweep::metrics::Metrics;
use regsweep::registry::{ManifestInfo, RegistryClient};
use regsweep::seed::seed_existing_images;
use regsweep::store::{MemoryStore, TrackingStore};

struct CatalogRegistry {
    tags: HashMap<String, Vec<String>>,
    infos: HashMap<String, ManifestInfo>,
}

#[async_trait]
impl RegistryClient for CatalogRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let mut repos: Vec<String> = self.tags.keys().cloned().collect();
        repos.sort();
        Ok(repos)
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        Ok(self.tags.get(repo).cloned().unwrap_or_default())
    }

    async fn get_manifest_info(&self, repo: &str, tag: &str) -> Result<ManifestInfo> {
        self.infos
            .get(&format!("{}:{}", repo, tag))
            .cloned()
            .ok_or_else(|| RegsweepError::Registry("manifest not found".to_string()))
    }

    async fn delete_manifest(&self, _repo: &str, _tag: &str) -> Result<()> {
        Ok(())
    }
}

fn ttls() -> (Duration, Duration) {
    (Duration::from_secs(3600), Duration::from_secs(24 * 3600))
}

#[tokio::test]
async fn seeds_every_catalog_entry_once() {
    let mut tags = HashMap::new();
    tags.insert("app1".to_string(), vec!["1h".to_string(), "latest".to_string()]);
    tags.insert("app2".to_string(), vec!["30m".to_string()]);

    let mut infos = HashMap::new();
    infos.insert(
        "app1:1h".to_string(),
        ManifestInfo {
            digest: "sha256:a".to_string(),
            size_bytes: 1000,
        },
    );
    infos.insert(
        "app2:30m".to_string(),
        ManifestInfo {
            digest: "sha256:b".to_string(),
            size_bytes: 2000,
        },
    );
    // app1:latest has no manifest info; it is still seeded with size 0.

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(CatalogRegistry { tags, infos });
    let metrics = Arc::new(Metrics::new().unwrap());
    let (default_ttl, max_ttl) = ttls();

    seed_existing_images(
        store.clone(),
        registry.clone(),
        metrics.clone(),
        default_ttl,
        max_ttl,
    )
    .await
    .unwrap();

    assert_eq!(store.image_count().await.unwrap(), 3);
    assert_eq!(
        store.get_image_digest("app1:1h").await.unwrap(),
        Some("sha256:a".to_string())
    );
    assert_eq!(store.get_image_size("app1:latest").await.unwrap(), Some(0));
    assert!(store.is_initialized().await.unwrap());
    assert_eq!(metrics.images_tracked_total.get(), 3);
    assert_eq!(metrics.tracked_bytes_total.get(), 3000);

    // A second run is a no-op: the sentinel is already set.
    seed_existing_images(store.clone(), registry, metrics.clone(), default_ttl, max_ttl)
        .await
        .unwrap();
    assert_eq!(metrics.images_tracked_total.get(), 3);
}

#[tokio::test]
async fn initialized_store_is_not_rescanned() {
    let store = Arc::new(MemoryStore::new());
    store.set_initialized().await.unwrap();

    let registry = Arc::new(CatalogRegistry {
        tags: HashMap::from([("app".to_string(), vec!["1h".to_string()])]),
        infos: HashMap::new(),
    });
    let metrics = Arc::new(Metrics::new().unwrap());
    let (default_ttl, max_ttl) = ttls();

    seed_existing_images(store.clone(), registry, metrics, default_ttl, max_ttl)
        .await
        .unwrap();

    assert_eq!(store.image_count().await.unwrap(), 0);
}
