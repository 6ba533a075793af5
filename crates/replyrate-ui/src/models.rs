//! Data models for templates and API responses

use crate::controller::{DashboardSnapshot, ResolvedRanges};
use crate::view::DashboardView;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use replyrate_core::{ComparePeriod, Error, FilterSelection, Period, WeekStart};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An `<option>` in one of the filter selects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub fn period_label(period: Period) -> &'static str {
    match period {
        Period::CurrentWeek => "Current week",
        Period::CurrentMonth => "Current month",
        Period::LastWeek => "Last week",
        Period::LastMonth => "Last month",
    }
}

pub fn compare_label(compare: ComparePeriod) -> &'static str {
    match compare.period() {
        Some(period) => period_label(period),
        None => "No comparison",
    }
}

/// A selectable user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: Uuid,
    pub label: String,
}

/// Filter choices and defaults for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub users: Vec<UserEntry>,

    /// Defaults to the first entry of `users`
    #[serde(default)]
    pub default_user: Option<Uuid>,

    #[serde(default = "default_period")]
    pub default_period: Period,

    #[serde(default)]
    pub default_period_compare: ComparePeriod,

    #[serde(default)]
    pub week_start: WeekStart,

    /// Trailing debounce for filter changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_period() -> Period {
    Period::CurrentMonth
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            default_user: None,
            default_period: default_period(),
            default_period_compare: ComparePeriod::default(),
            week_start: WeekStart::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl DashboardConfig {
    /// Selection the page starts with
    pub fn initial_selection(&self) -> Result<FilterSelection, Error> {
        let user = match self.default_user {
            Some(id) => id,
            None => self
                .users
                .first()
                .map(|u| u.id)
                .ok_or_else(|| Error::Config("no dashboard users configured".to_string()))?,
        };
        Ok(FilterSelection::new(
            user,
            self.default_period,
            self.default_period_compare,
        ))
    }

    pub fn is_known_user(&self, id: &Uuid) -> bool {
        self.users.iter().any(|u| &u.id == id)
    }

    pub fn user_options(&self, selected: &Uuid) -> Vec<SelectOption> {
        self.users
            .iter()
            .map(|u| SelectOption {
                value: u.id.to_string(),
                label: u.label.clone(),
                selected: &u.id == selected,
            })
            .collect()
    }
}

pub fn period_options(selected: Period) -> Vec<SelectOption> {
    Period::ALL
        .iter()
        .map(|p| SelectOption {
            value: p.as_str().to_string(),
            label: period_label(*p).to_string(),
            selected: *p == selected,
        })
        .collect()
}

pub fn compare_options(selected: ComparePeriod) -> Vec<SelectOption> {
    ComparePeriod::ALL
        .iter()
        .map(|p| SelectOption {
            value: p.as_str().to_string(),
            label: compare_label(*p).to_string(),
            selected: *p == selected,
        })
        .collect()
}

/// Raw filter values, as posted by the form or the page script
#[derive(Debug, Clone, Deserialize)]
pub struct FilterForm {
    pub user: String,
    pub period: String,
    #[serde(default = "default_compare_value")]
    pub period_compare: String,
}

pub fn default_compare_value() -> String {
    ComparePeriod::None.as_str().to_string()
}

impl FilterForm {
    /// Validate against the known periods and configured users
    pub fn into_selection(self, config: &DashboardConfig) -> Result<FilterSelection, Error> {
        let selection = FilterSelection::parse(&self.user, &self.period, &self.period_compare)?;
        if !config.is_known_user(&selection.user) {
            return Err(Error::InvalidUser(format!("unknown user {}", selection.user)));
        }
        Ok(selection)
    }
}

/// `GET /api/dashboard`
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub generation: u64,
    pub filters: FilterSelection,
    pub primary_range: Option<String>,
    pub compare_range: Option<String>,
    pub view: DashboardView,
}

impl From<&DashboardSnapshot> for DashboardResponse {
    fn from(snap: &DashboardSnapshot) -> Self {
        Self {
            generation: snap.generation,
            filters: snap.filters.clone(),
            primary_range: snap.primary_range.map(|r| r.to_string()),
            compare_range: snap.compare_range.map(|r| r.to_string()),
            view: snap.view(),
        }
    }
}

/// `GET /api/resolve`
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub today: String,
    pub week_start: WeekStart,
    #[serde(flatten)]
    pub ranges: ResolvedRanges,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error mapped to an HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::UnknownPeriod(_) | Error::InvalidUser(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
