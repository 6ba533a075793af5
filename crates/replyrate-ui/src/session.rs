//! Per-page dashboard sessions
//!
//! Every browser gets its own [`DashboardController`], keyed by a session
//! cookie, so one viewer's filter changes never touch another viewer's
//! selection or charts. Sessions that have not been seen for the idle
//! timeout are dropped, which aborts their refresh loop.

use crate::AppState;
use crate::controller::{ControllerConfig, DashboardController};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use replyrate_core::{AggregateSource, FilterSelection};
use replyrate_observability::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "replyrate_session";

/// Default idle time before a session is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct SessionEntry {
    controller: Arc<DashboardController>,
    last_seen: Instant,
}

/// The session a request belongs to, inserted by [`session_middleware`]
#[derive(Clone)]
pub struct PageSession {
    pub id: Uuid,
    pub controller: Arc<DashboardController>,
}

/// Dashboard controllers by session id
pub struct DashboardSessions {
    source: Arc<dyn AggregateSource>,
    initial: FilterSelection,
    config: ControllerConfig,
    metrics: Arc<Metrics>,
    idle_timeout: Duration,
    sessions: DashMap<Uuid, SessionEntry>,
}

impl DashboardSessions {
    /// New sessions start from `initial` and are configured with `config`
    pub fn new(
        source: Arc<dyn AggregateSource>,
        initial: FilterSelection,
        config: ControllerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            initial,
            config,
            metrics,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: DashMap::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Look up a live session and mark it as seen. Returns `None` for
    /// unknown ids and for sessions past the idle timeout.
    pub fn touch(&self, id: &Uuid) -> Option<Arc<DashboardController>> {
        let mut entry = self.sessions.get_mut(id)?;
        if entry.last_seen.elapsed() >= self.idle_timeout {
            drop(entry);
            self.sessions.remove(id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.controller))
    }

    /// Start a new session; its default selection is fetched right away.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&self) -> PageSession {
        self.evict_idle();

        let id = Uuid::new_v4();
        let controller = Arc::new(DashboardController::spawn(
            Arc::clone(&self.source),
            self.initial.clone(),
            self.config.clone(),
            Arc::clone(&self.metrics),
        ));
        self.sessions.insert(
            id,
            SessionEntry {
                controller: Arc::clone(&controller),
                last_seen: Instant::now(),
            },
        );
        debug!("Opened dashboard session {} ({} live)", id, self.len());

        PageSession { id, controller }
    }

    /// Existing session for `id`, or a fresh one
    pub fn resolve(&self, id: Option<Uuid>) -> (PageSession, bool) {
        if let Some(id) = id
            && let Some(controller) = self.touch(&id)
        {
            return (PageSession { id, controller }, false);
        }
        (self.open(), true)
    }

    /// Drop sessions idle for longer than the timeout
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let idle_timeout = self.idle_timeout;
        self.sessions
            .retain(|_, entry| entry.last_seen.elapsed() < idle_timeout);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!("Evicted {} idle dashboard session(s)", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop every session's refresh loop
    pub fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.controller.shutdown();
        }
        self.sessions.clear();
    }
}

/// Session id from the request's `Cookie` headers, if well-formed
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

fn session_cookie(id: Uuid) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id
    )
}

/// Attach the caller's [`PageSession`] to the request, opening one (and
/// setting the cookie) when the request carries no live session
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let (session, created) = state.sessions.resolve(session_id(req.headers()));
    let id = session.id;
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;

    if created {
        match HeaderValue::from_str(&session_cookie(id)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to set session cookie: {}", e),
        }
    }

    response
}
