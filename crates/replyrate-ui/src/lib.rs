//! ReplyRate Web UI
//!
//! Embedded dashboard showing reply-rate statistics for one user and period,
//! optionally compared with a second period. HTML templates and custom JS/CSS
//! are compiled into the binary; Chart.js is loaded from CDN.

pub mod controller;
pub mod handlers;
pub mod models;
pub mod server;
pub mod session;
pub mod view;

pub use controller::{ControllerConfig, DashboardController, DashboardSnapshot, ResolvedRanges};
pub use models::{DashboardConfig, UserEntry};
pub use server::{UiConfig, UiServer};
pub use session::{DashboardSessions, PageSession};
pub use view::{DashboardView, FetchState};

use std::sync::Arc;

/// Shared application state for the UI server
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<DashboardSessions>,
    pub dashboard: Arc<DashboardConfig>,
    pub config: UiConfig,
}
