//! Hasura GraphQL aggregate connector

use crate::auth::{Authenticator, Credentials};
use crate::client::{HttpClientConfig, create_client, error_from_response, with_retry};
use crate::{EgressError, Result};
use async_trait::async_trait;
use replyrate_core::{AggregateCounts, AggregateSource, Channel, Outcome, PeriodQuery};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Six aliased aggregate counts over `historyentries`, one per (channel, outcome)
pub const STATISTICS_QUERY: &str = r#"
    query MyQuery($userId: uuid!, $createdAtGte: timestamptz!, $createdAtLt: timestamptz!) {
      email_solicitation_success: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: true}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "EMAIL_SENT"}}) {
        aggregate {
          count
        }
      }
      email_solicitation_failed: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: false}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "EMAIL_SENT"}}) {
        aggregate {
          count
        }
      }
      linkedin_message_solicitation_success: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: true}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "LINKEDIN_MESSAGE_SENT"}}) {
        aggregate {
          count
        }
      }
      linkedin_message_solicitation_failed: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: false}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "LINKEDIN_MESSAGE_SENT"}}) {
        aggregate {
          count
        }
      }
      linkedin_inmail_solicitation_success: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: true}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "LINKEDIN_INMAIL_SENT"}}) {
        aggregate {
          count
        }
      }
      linkedin_inmail_solicitation_failed: historyentries_aggregate(where: {deletedAt: {_is_null: true}, triggerHasBeenRepliedTo: {_is_null: false, _eq: false}, userId: {_eq: $userId }, createdAt: {_gte: $createdAtGte, _lt: $createdAtLt}, type: {_eq: "LINKEDIN_INMAIL_SENT"}}) {
        aggregate {
          count
        }
      }
    }
"#;

/// Hasura connector configuration
#[derive(Debug, Clone)]
pub struct HasuraConfig {
    /// GraphQL endpoint (e.g. https://<sub>.graphql.<region>.nhost.run/v1)
    pub graphql_url: String,

    /// Nhost auth base URL, required for email/password credentials
    pub auth_url: Option<String>,

    /// Credentials applied to every request
    pub credentials: Credentials,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl HasuraConfig {
    /// Create a configuration for a plain GraphQL endpoint
    pub fn new(graphql_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            graphql_url: graphql_url.into(),
            auth_url: None,
            credentials,
            client_config: HttpClientConfig::default(),
        }
    }

    /// Derive GraphQL and auth endpoints from an Nhost subdomain and region
    pub fn nhost(subdomain: &str, region: &str, credentials: Credentials) -> Self {
        Self {
            graphql_url: format!("https://{}.graphql.{}.nhost.run/v1", subdomain, region),
            auth_url: Some(format!("https://{}.auth.{}.nhost.run/v1", subdomain, region)),
            credentials,
            client_config: HttpClientConfig::default(),
        }
    }

    /// Set the auth base URL
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Set the HTTP client configuration
    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

#[derive(Debug, Serialize)]
struct GraphQLRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<HashMap<String, AggregateField>>,
    #[serde(default)]
    errors: Vec<GraphQLErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorEntry {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQLErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregateField {
    aggregate: AggregateValue,
}

#[derive(Debug, Deserialize)]
struct AggregateValue {
    count: u64,
}

/// Hasura connector
pub struct HasuraConnector {
    config: HasuraConfig,
    client: Client,
    auth: Authenticator,
}

impl HasuraConnector {
    /// Create a new Hasura connector
    pub fn new(config: HasuraConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        let auth = Authenticator::new(
            config.credentials.clone(),
            config.auth_url.clone(),
            client.clone(),
        )?;
        Ok(Self {
            config,
            client,
            auth,
        })
    }

    pub fn config(&self) -> &HasuraConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Establish the backend session up front
    pub async fn connect(&self) -> Result<()> {
        self.auth.sign_in().await?;
        info!("✓ Aggregation backend configured at {}", self.config.graphql_url);
        Ok(())
    }

    /// Run the statistics query, re-authenticating once on an expired session
    #[instrument(skip(self), fields(user = %query.user_id, range = %query.range))]
    pub async fn query_counts(&self, query: &PeriodQuery) -> Result<AggregateCounts> {
        match self.execute(query).await {
            Err(EgressError::Unauthorized(msg)) if self.auth.can_reauthenticate() => {
                warn!("Backend rejected session ({}), signing in again", msg);
                self.auth.invalidate().await;
                self.execute(query).await
            }
            other => other,
        }
    }

    async fn execute(&self, query: &PeriodQuery) -> Result<AggregateCounts> {
        let started = Instant::now();
        let variables = query.variables();

        let counts = with_retry(self.config.client_config.max_retries, || {
            let variables = variables.clone();
            async move {
                let request = self.client.post(&self.config.graphql_url).json(&GraphQLRequest {
                    query: STATISTICS_QUERY,
                    variables,
                });
                let response = self.auth.apply(request).await?.send().await?;

                if !response.status().is_success() {
                    return Err(error_from_response(response).await);
                }

                let body: GraphQLResponse = response.json().await.map_err(|e| {
                    EgressError::ParseError(format!("Failed to parse GraphQL response: {}", e))
                })?;
                parse_counts(body)
            }
        })
        .await?;

        debug!(
            "Fetched aggregate counts in {}ms: {:?}",
            started.elapsed().as_millis(),
            counts
        );
        Ok(counts)
    }
}

fn parse_counts(body: GraphQLResponse) -> Result<AggregateCounts> {
    if let Some(first) = body.errors.first() {
        let code = first.extensions.as_ref().and_then(|e| e.code.as_deref());
        let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
        let message = messages.join("; ");
        return Err(match code {
            Some("invalid-jwt") | Some("invalid-headers") => EgressError::Unauthorized(message),
            _ => EgressError::GraphQLError(message),
        });
    }

    let data = body
        .data
        .ok_or_else(|| EgressError::ParseError("GraphQL response has no data".to_string()))?;

    let mut counts = AggregateCounts::default();
    for channel in Channel::ALL {
        for outcome in Outcome::ALL {
            let alias = channel.alias(outcome);
            let field = data
                .get(&alias)
                .ok_or_else(|| EgressError::ParseError(format!("missing field '{}'", alias)))?;
            counts.set(channel, outcome, field.aggregate.count);
        }
    }
    Ok(counts)
}

#[async_trait]
impl AggregateSource for HasuraConnector {
    async fn fetch_counts(&self, query: &PeriodQuery) -> replyrate_core::Result<AggregateCounts> {
        Ok(self.query_counts(query).await?)
    }

    fn is_ready(&self) -> bool {
        self.auth.is_authenticated()
    }

    async fn shutdown(&self) -> replyrate_core::Result<()> {
        Ok(self.auth.sign_out().await?)
    }
}
