//! ReplyRate Egress Connectors
//!
//! This crate provides the connector to the aggregation backend:
//! - Hasura GraphQL connector (Nhost hosted or self-hosted)
//! - Credential handling and session lifecycle
//! - TTL result cache wrapping any aggregate source

pub mod auth;
pub mod cache;
pub mod client;
pub mod hasura;

pub use auth::{Authenticator, Credentials};
pub use cache::CachedSource;
pub use client::{HttpClientConfig, create_client, parse_retry_after, with_retry};
pub use hasura::{HasuraConfig, HasuraConnector, STATISTICS_QUERY};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend returned {status_code}: {message}")]
    BackendError { status_code: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQLError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Rate limit exceeded{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimitExceeded { retry_after_secs: Option<u64> },
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for replyrate_core::Error {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::RateLimitExceeded { retry_after_secs } => {
                replyrate_core::Error::RateLimitExceeded { retry_after_secs }
            }
            EgressError::Unauthorized(msg) => replyrate_core::Error::Auth(msg),
            EgressError::ConfigError(msg) => replyrate_core::Error::Config(msg),
            other => replyrate_core::Error::Source(other.to_string()),
        }
    }
}
