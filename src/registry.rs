//! OCI distribution HTTP client.
//!
//! Covers the small protocol surface the tracker needs: catalog and tag
//! enumeration (paginated), manifest metadata (size + digest), and manifest
//! deletion by digest.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::config::{
    LIST_PAGE_SIZE, MANIFEST_ACCEPT_HEADER, REGISTRY_DELETE_TIMEOUT, REGISTRY_READ_TIMEOUT,
};
use crate::error::{RegsweepError, Result};

/// Manifest metadata recorded at tracking time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    pub digest: String,
    pub size_bytes: i64,
}

/// Registry operations the webhook pipeline, the seeder, and the reaper
/// depend on.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>>;
    async fn list_tags(&self, repo: &str) -> Result<Vec<String>>;
    async fn get_manifest_info(&self, repo: &str, tag: &str) -> Result<ManifestInfo>;

    /// Delete the manifest a tag points at. A tag that is already gone from
    /// the registry counts as success.
    async fn delete_manifest(&self, repo: &str, tag: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ManifestV2 {
    #[serde(default)]
    config: Descriptor,
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Deserialize, Default)]
struct Descriptor {
    #[serde(default)]
    size: i64,
}

pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(registry_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REGISTRY_READ_TIMEOUT)
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(HttpRegistryClient {
            base_url: registry_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

/// Extract the content digest from response headers: `Docker-Content-Digest`
/// when present, otherwise the `ETag` with surrounding quotes stripped.
fn digest_from_headers(headers: &HeaderMap) -> String {
    if let Some(digest) = headers
        .get("docker-content-digest")
        .and_then(|v| v.to_str().ok())
    {
        return digest.to_string();
    }
    headers
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(|etag| etag.trim_matches('"').to_string())
        .unwrap_or_default()
}

/// Parse the pagination `Link` header: `</path>; rel="next"`. Paths rooted at
/// `/` are joined to the base URL; absolute URLs pass through.
fn next_link(headers: &HeaderMap, base_url: &str) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    let start = link.find('<')?;
    let end = link.find('>')?;
    if end <= start {
        return None;
    }
    let path = &link[start + 1..end];
    if let Some(rooted) = path.strip_prefix('/') {
        Some(format!("{}/{}", base_url, rooted))
    } else {
        Some(path.to_string())
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let mut all = Vec::new();
        let mut url = Some(format!("{}/v2/_catalog?n={}", self.base_url, LIST_PAGE_SIZE));

        while let Some(page_url) = url.take() {
            let resp = self.http.get(&page_url).send().await?;
            if !resp.status().is_success() {
                return Err(RegsweepError::Registry(format!(
                    "catalog request failed: status {}",
                    resp.status().as_u16()
                )));
            }
            url = next_link(resp.headers(), &self.base_url);
            let page: CatalogResponse = resp.json().await?;
            all.extend(page.repositories);
        }

        Ok(all)
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        let mut all = Vec::new();
        let mut url = Some(format!(
            "{}/v2/{}/tags/list?n={}",
            self.base_url, repo, LIST_PAGE_SIZE
        ));

        while let Some(page_url) = url.take() {
            let resp = self.http.get(&page_url).send().await?;
            if !resp.status().is_success() {
                return Err(RegsweepError::Registry(format!(
                    "tags request for {} failed: status {}",
                    repo,
                    resp.status().as_u16()
                )));
            }
            url = next_link(resp.headers(), &self.base_url);
            let page: TagsResponse = resp.json().await?;
            all.extend(page.tags);
        }

        Ok(all)
    }

    async fn get_manifest_info(&self, repo: &str, tag: &str) -> Result<ManifestInfo> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, tag);
        let resp = self
            .http
            .get(&url)
            .header("Accept", MANIFEST_ACCEPT_HEADER)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(RegsweepError::Registry(format!(
                "manifest request for {}:{} failed: status {}",
                repo,
                tag,
                resp.status().as_u16()
            )));
        }

        let digest = digest_from_headers(resp.headers());
        let manifest: ManifestV2 = resp.json().await?;
        let size_bytes = manifest.config.size
            + manifest.layers.iter().map(|layer| layer.size).sum::<i64>();

        Ok(ManifestInfo { digest, size_bytes })
    }

    async fn delete_manifest(&self, repo: &str, tag: &str) -> Result<()> {
        // Resolve the tag to its digest first; deletes address the manifest
        // by digest, not by tag.
        let manifest_url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, tag);
        let head = self
            .http
            .head(&manifest_url)
            .header("Accept", MANIFEST_ACCEPT_HEADER)
            .timeout(REGISTRY_DELETE_TIMEOUT)
            .send()
            .await?;

        if head.status() == reqwest::StatusCode::NOT_FOUND {
            // Already gone from the registry.
            return Ok(());
        }
        if !head.status().is_success() {
            return Err(RegsweepError::Registry(format!(
                "HEAD manifest for {}:{} returned {}",
                repo,
                tag,
                head.status().as_u16()
            )));
        }

        let digest = digest_from_headers(head.headers());
        if digest.is_empty() {
            return Err(RegsweepError::Registry(format!(
                "no digest found for {}:{}",
                repo, tag
            )));
        }

        let delete_url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, digest);
        let resp = self
            .http
            .delete(&delete_url)
            .header("Accept", MANIFEST_ACCEPT_HEADER)
            .timeout(REGISTRY_DELETE_TIMEOUT)
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 202 | 404 => Ok(()),
            status => Err(RegsweepError::Registry(format!(
                "DELETE manifest for {}:{} returned {}",
                repo, tag, status
            ))),
        }
    }
}
