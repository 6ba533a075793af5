//! Web UI server implementation

use crate::AppState;
use crate::handlers;
use crate::models::DashboardConfig;
use crate::session::{DashboardSessions, session_middleware};
use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use replyrate_observability::{HealthState, health_router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// UI server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Host to bind to (default: 127.0.0.1 for security)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (default: 8083)
    #[serde(default = "default_port")]
    pub port: u16,

    /// How often the page polls `/api/dashboard`, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Page title
    #[serde(default = "default_title")]
    pub title: String,

    /// Seconds without a request before a page session is dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8083
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_title() -> String {
    "Reply rate".to_string()
}
fn default_session_idle_secs() -> u64 {
    30 * 60
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            title: default_title(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl UiConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address {}:{}: {}", self.host, self.port, e))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

/// UI Server
pub struct UiServer {
    config: UiConfig,
    sessions: Arc<DashboardSessions>,
    dashboard: Arc<DashboardConfig>,
    health: Option<HealthState>,
}

impl UiServer {
    /// Create a new UI server
    pub fn new(
        config: UiConfig,
        sessions: Arc<DashboardSessions>,
        dashboard: Arc<DashboardConfig>,
    ) -> Self {
        Self {
            config,
            sessions,
            dashboard,
            health: None,
        }
    }

    /// Also serve `/healthz`, `/readyz` and `/metrics`
    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = Some(health);
        self
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        let state = AppState {
            sessions: Arc::clone(&self.sessions),
            dashboard: Arc::clone(&self.dashboard),
            config: self.config.clone(),
        };

        // Everything that reads or writes a selection runs inside a session
        let router = Router::new()
            // HTML page and no-JS form target
            .route("/", get(handlers::dashboard::dashboard))
            .route("/filters", post(handlers::dashboard::submit_filters))
            // JSON API endpoints
            .route(
                "/api/filters",
                get(handlers::api::get_filters).post(handlers::api::update_filters),
            )
            .route("/api/dashboard", get(handlers::api::dashboard))
            .route("/api/resolve", get(handlers::api::resolve))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                session_middleware,
            ))
            // Static assets (embedded in binary)
            .route("/static/css/style.css", get(handlers::static_files::serve_css))
            .route("/static/js/app.js", get(handlers::static_files::serve_app_js))
            .route("/static/js/charts.js", get(handlers::static_files::serve_charts_js))
            .with_state(state);

        let router = match &self.health {
            Some(health) => router.merge(health_router(health.clone())),
            None => router,
        };

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr()?;
        let router = self.build_router();

        info!("📊 ReplyRate UI server starting on http://{}", addr);
        info!("   Dashboard:  http://{}/", addr);
        if self.health.is_some() {
            info!("   Health:     http://{}/healthz", addr);
            info!("   Metrics:    http://{}/metrics", addr);
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("UI server stopped");
        Ok(())
    }
}
