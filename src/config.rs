use std::time::Duration;

use crate::error::{RegsweepError, Result};

/// Accept header for manifest requests against the registry.
/// Lists both OCI and Docker v2 single-platform manifest types.
pub const MANIFEST_ACCEPT_HEADER: &str = "application/vnd.oci.image.manifest.v1+json,\
     application/vnd.docker.distribution.manifest.v2+json";

/// Page size for catalog and tag listing requests.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// Lease on the reaper lock. A crashed holder frees the lock after this.
pub const REAPER_LOCK_LEASE: Duration = Duration::from_secs(5 * 60);

/// Timeout for registry reads (catalog, tags, manifests).
pub const REGISTRY_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for registry manifest deletes (HEAD + DELETE).
pub const REGISTRY_DELETE_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period for in-flight work after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runtime configuration, read from process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub hook_token: String,
    pub registry_url: String,
    pub hostname: String,
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    pub reap_interval: Duration,
    pub log_format: LogFormat,
    pub immutable_tag_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl Config {
    /// Build configuration from the process environment, applying defaults
    /// for everything except the secrets the deployment must provide.
    pub fn from_env() -> Self {
        Config {
            port: env_parsed("PORT", 8000),
            redis_url: env_str(
                "REDIS_URL",
                &env_str("REDISCLOUD_URL", "redis://localhost:6379"),
            ),
            hook_token: env_str("HOOK_TOKEN", ""),
            registry_url: env_str("REGISTRY_URL", "http://localhost:5000"),
            hostname: env_str("HOSTNAME_OVERRIDE", "registry.local"),
            default_ttl: env_duration("DEFAULT_TTL", Duration::from_secs(3600)),
            max_ttl: env_duration("MAX_TTL", Duration::from_secs(24 * 3600)),
            reap_interval: env_duration("REAP_INTERVAL", Duration::from_secs(60)),
            log_format: env_str("LOG_FORMAT", "json").parse().unwrap_or_default(),
            immutable_tag_patterns: env_patterns("IMMUTABLE_TAG_PATTERNS"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_url.is_empty() {
            return Err(RegsweepError::Config("REDIS_URL must be set".to_string()));
        }
        if self.hook_token.is_empty() {
            return Err(RegsweepError::Config("HOOK_TOKEN must be set".to_string()));
        }
        if self.registry_url.is_empty() {
            return Err(RegsweepError::Config("REGISTRY_URL must be set".to_string()));
        }
        if self.default_ttl.is_zero() {
            return Err(RegsweepError::Config(
                "DEFAULT_TTL must be greater than zero".to_string(),
            ));
        }
        if self.max_ttl.is_zero() {
            return Err(RegsweepError::Config(
                "MAX_TTL must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl > self.max_ttl {
            return Err(RegsweepError::Config(format!(
                "DEFAULT_TTL ({}) must not exceed MAX_TTL ({})",
                humantime::format_duration(self.default_ttl),
                humantime::format_duration(self.max_ttl),
            )));
        }
        Ok(())
    }
}

fn env_str(key: &str, fallback: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_duration(key: &str, fallback: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| humantime::parse_duration(&v).ok())
        .unwrap_or(fallback)
}

fn env_patterns(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
