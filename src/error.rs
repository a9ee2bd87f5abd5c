use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegsweepError>;

#[derive(Error, Debug)]
pub enum RegsweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("tag {tag} on {repo} is immutable, overwrite rejected")]
    ImmutableTag { repo: String, tag: String },
}
