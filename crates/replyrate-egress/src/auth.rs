//! Backend authentication
//!
//! Turns externally supplied credentials into request headers. Three modes
//! are supported:
//! - a static bearer access token
//! - a Hasura admin secret
//! - Nhost email/password sign-in, with the session token cached until it
//!   expires and released with a sign-out on shutdown

use crate::client::error_from_response;
use crate::{EgressError, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Refresh the session this long before the backend says it expires
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Header carrying the Hasura admin secret
pub const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Credentials used to reach the aggregation backend
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication (public role)
    Anonymous,
    /// Static bearer token
    AccessToken(String),
    /// Hasura admin secret
    AdminSecret(String),
    /// Nhost email/password sign-in
    EmailPassword { email: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::AccessToken(_) => write!(f, "AccessToken(<redacted>)"),
            Credentials::AdminSecret(_) => write!(f, "AdminSecret(<redacted>)"),
            Credentials::EmailPassword { email, .. } => {
                write!(f, "EmailPassword {{ email: {:?}, password: <redacted> }}", email)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl Session {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_SKEW < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    session: Option<SessionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    access_token: String,
    access_token_expires_in: u64,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignOutRequest<'a> {
    refresh_token: &'a str,
}

/// Applies credentials to outgoing requests and owns the session lifecycle
pub struct Authenticator {
    credentials: Credentials,
    auth_url: Option<String>,
    client: Client,
    session: RwLock<Option<Session>>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("credentials", &self.credentials)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl Authenticator {
    /// Create an authenticator.
    ///
    /// Email/password credentials require the Nhost auth base URL.
    pub fn new(credentials: Credentials, auth_url: Option<String>, client: Client) -> Result<Self> {
        if matches!(credentials, Credentials::EmailPassword { .. }) && auth_url.is_none() {
            return Err(EgressError::ConfigError(
                "email/password authentication requires an auth URL".to_string(),
            ));
        }
        Ok(Self {
            credentials,
            auth_url: auth_url.map(|u| u.trim_end_matches('/').to_string()),
            client,
            session: RwLock::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Attach authentication headers, signing in first if needed
    pub async fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        match &self.credentials {
            Credentials::Anonymous => Ok(builder),
            Credentials::AccessToken(token) => Ok(builder.bearer_auth(token)),
            Credentials::AdminSecret(secret) => Ok(builder.header(ADMIN_SECRET_HEADER, secret)),
            Credentials::EmailPassword { .. } => {
                let token = self.access_token().await?;
                Ok(builder.bearer_auth(token))
            }
        }
    }

    /// Current session token, signing in when absent or about to expire
    async fn access_token(&self) -> Result<String> {
        if let Some(session) = self.session.read().await.as_ref()
            && session.is_fresh()
        {
            return Ok(session.access_token.clone());
        }

        let mut guard = self.session.write().await;
        // Another task may have signed in while we waited for the lock
        if let Some(session) = guard.as_ref()
            && session.is_fresh()
        {
            return Ok(session.access_token.clone());
        }

        let session = self.sign_in_inner().await?;
        let token = session.access_token.clone();
        *guard = Some(session);
        Ok(token)
    }

    /// Eagerly establish a session (no-op for static credentials)
    pub async fn sign_in(&self) -> Result<()> {
        if matches!(self.credentials, Credentials::EmailPassword { .. }) {
            self.access_token().await?;
        }
        Ok(())
    }

    async fn sign_in_inner(&self) -> Result<Session> {
        let (Credentials::EmailPassword { email, password }, Some(auth_url)) =
            (&self.credentials, &self.auth_url)
        else {
            return Err(EgressError::ConfigError(
                "sign-in requires email/password credentials and an auth URL".to_string(),
            ));
        };

        debug!("Signing in to {} as {}", auth_url, email);
        let response = self
            .client
            .post(format!("{}/signin/email-password", auth_url))
            .json(&SignInRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match error_from_response(response).await {
                EgressError::BackendError { status_code, message } => {
                    EgressError::Unauthorized(format!("sign-in failed ({}): {}", status_code, message))
                }
                other => other,
            });
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| EgressError::ParseError(format!("Failed to parse sign-in response: {}", e)))?;

        let payload = body.session.ok_or_else(|| {
            EgressError::Unauthorized("sign-in returned no session (MFA required?)".to_string())
        })?;

        info!(
            "🔑 Signed in as {} (token valid {}s)",
            email, payload.access_token_expires_in
        );
        Ok(Session {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expires_at: Instant::now() + Duration::from_secs(payload.access_token_expires_in),
        })
    }

    /// Drop the cached session so the next request signs in again
    pub async fn invalidate(&self) {
        if self.session.write().await.take().is_some() {
            debug!("Session token invalidated");
        }
    }

    /// Whether a retry after [`invalidate`](Self::invalidate) can help
    pub fn can_reauthenticate(&self) -> bool {
        matches!(self.credentials, Credentials::EmailPassword { .. })
    }

    /// Whether requests can currently be authenticated without a round trip
    pub fn is_authenticated(&self) -> bool {
        match &self.credentials {
            Credentials::EmailPassword { .. } => self
                .session
                .try_read()
                .map(|s| s.as_ref().is_some_and(Session::is_fresh))
                .unwrap_or(true),
            _ => true,
        }
    }

    /// End the backend session, if any
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let (Some(auth_url), Some(refresh_token)) = (&self.auth_url, &session.refresh_token) else {
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/signout", auth_url))
            .bearer_auth(&session.access_token)
            .json(&SignOutRequest { refresh_token })
            .send()
            .await?;

        if response.status().is_success() {
            info!("🔒 Signed out of backend session");
            Ok(())
        } else {
            let err = error_from_response(response).await;
            warn!("Sign-out failed: {}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpClientConfig, create_client};

    fn client() -> Client {
        create_client(&HttpClientConfig::default()).unwrap()
    }

    #[test]
    fn test_email_password_requires_auth_url() {
        let creds = Credentials::EmailPassword {
            email: "ops@example.com".to_string(),
            password: "secret".to_string(),
        };
        let err = Authenticator::new(creds, None, client()).unwrap_err();
        assert!(matches!(err, EgressError::ConfigError(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::EmailPassword {
            email: "ops@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("ops@example.com"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", Credentials::AdminSecret("topsecret".to_string()));
        assert!(!debug.contains("topsecret"));
    }

    #[test]
    fn test_static_credentials_are_always_authenticated() {
        let auth =
            Authenticator::new(Credentials::AccessToken("t".to_string()), None, client()).unwrap();
        assert!(auth.is_authenticated());
        assert!(!auth.can_reauthenticate());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let auth = Authenticator::new(
            Credentials::EmailPassword {
                email: "ops@example.com".to_string(),
                password: "secret".to_string(),
            },
            Some("http://127.0.0.1:9/v1/".to_string()),
            client(),
        )
        .unwrap();
        assert!(!auth.is_authenticated());
        assert!(auth.sign_out().await.is_ok());
    }
}
