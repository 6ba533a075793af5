//! Dashboard page handlers

use crate::AppState;
use crate::models::{ApiError, FilterForm, SelectOption, compare_options, period_options};
use crate::session::PageSession;
use crate::view::DashboardView;
use askama::Template;
use axum::{
    Extension, Form,
    extract::State,
    response::{Html, Redirect},
};
use tracing::error;

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    title: String,
    poll_interval_ms: u64,
    users: Vec<SelectOption>,
    periods: Vec<SelectOption>,
    compares: Vec<SelectOption>,
    status: &'static str,
    message: String,
    primary_range: String,
    compare_range: String,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<PageSession>,
) -> Result<Html<String>, ApiError> {
    let filters = session.controller.filters();
    let snapshot = session.controller.snapshot();

    let (status, message) = match snapshot.view() {
        DashboardView::Loading { message } => ("loading", message),
        DashboardView::Error { message } => ("error", message),
        DashboardView::Ready { .. } => ("ready", String::new()),
    };

    let template = DashboardTemplate {
        title: state.config.title.clone(),
        poll_interval_ms: state.config.poll_interval_ms,
        users: state.dashboard.user_options(&filters.user),
        periods: period_options(filters.period),
        compares: compare_options(filters.period_compare),
        status,
        message,
        primary_range: snapshot
            .primary_range
            .map(|r| r.to_string())
            .unwrap_or_default(),
        compare_range: snapshot
            .compare_range
            .map(|r| r.to_string())
            .unwrap_or_default(),
    };

    template.render().map(Html).map_err(|e| {
        error!("Failed to render dashboard: {}", e);
        ApiError::internal("failed to render dashboard")
    })
}

/// Form fallback for browsers without JavaScript
pub async fn submit_filters(
    State(state): State<AppState>,
    Extension(session): Extension<PageSession>,
    Form(form): Form<FilterForm>,
) -> Result<Redirect, ApiError> {
    let selection = form.into_selection(&state.dashboard)?;
    session.controller.submit(selection);
    Ok(Redirect::to("/"))
}
