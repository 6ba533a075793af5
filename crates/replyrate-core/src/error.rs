//! Error types for ReplyRate Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown period '{0}' (expected current_week, current_month, last_week or last_month)")]
    UnknownPeriod(String),

    #[error("Invalid user id: {0}")]
    InvalidUser(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Aggregate source error: {0}")]
    Source(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
