//! Dashboard view composition
//!
//! The page shows either a loading message, an error message, or the charts.
//! Only the primary fetch decides which; the comparison fetch can at most add
//! the bar chart.

use replyrate_core::{AggregateCounts, ChartData, shape};
use serde::{Deserialize, Serialize};

pub const LOADING_MESSAGE: &str = "Loading your statistics…";
pub const ERROR_MESSAGE: &str = "An error occurred while retrieving your statistics";

/// State of one aggregate fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchState {
    /// Not requested (comparison set to `none`)
    Skipped,
    Pending,
    Ready { counts: AggregateCounts },
    Failed { error: String },
}

impl FetchState {
    pub fn counts(&self) -> Option<&AggregateCounts> {
        match self {
            FetchState::Ready { counts } => Some(counts),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }
}

/// What the chart area renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardView {
    Loading { message: String },
    Error { message: String },
    Ready { charts: ChartData },
}

impl DashboardView {
    pub fn loading() -> Self {
        DashboardView::Loading {
            message: LOADING_MESSAGE.to_string(),
        }
    }

    pub fn error() -> Self {
        DashboardView::Error {
            message: ERROR_MESSAGE.to_string(),
        }
    }

    /// Combine both fetch states into the rendered view
    pub fn compose(primary: &FetchState, compare: &FetchState) -> Self {
        match primary {
            FetchState::Ready { counts } => DashboardView::Ready {
                charts: shape(counts, compare.counts()),
            },
            FetchState::Failed { .. } => DashboardView::error(),
            // A primary fetch is never skipped
            FetchState::Pending | FetchState::Skipped => DashboardView::loading(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DashboardView::Loading { .. })
    }

    pub fn charts(&self) -> Option<&ChartData> {
        match self {
            DashboardView::Ready { charts } => Some(charts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> FetchState {
        FetchState::Ready {
            counts: AggregateCounts {
                email_success: 7,
                email_failure: 3,
                message_success: 10,
                message_failure: 0,
                inmail_success: 2,
                inmail_failure: 8,
            },
        }
    }

    fn failed() -> FetchState {
        FetchState::Failed {
            error: "timeout".to_string(),
        }
    }

    #[test]
    fn test_primary_pending_is_exactly_loading() {
        for compare in [FetchState::Skipped, FetchState::Pending, ready(), failed()] {
            let view = DashboardView::compose(&FetchState::Pending, &compare);
            assert_eq!(view, DashboardView::loading());
        }
    }

    #[test]
    fn test_primary_failed_is_error() {
        for compare in [FetchState::Skipped, FetchState::Pending, ready(), failed()] {
            let view = DashboardView::compose(&failed(), &compare);
            assert_eq!(view, DashboardView::error());
        }
    }

    #[test]
    fn test_comparison_only_when_ready() {
        let view = DashboardView::compose(&ready(), &ready());
        assert!(view.charts().unwrap().comparison.is_some());

        for compare in [FetchState::Skipped, FetchState::Pending, failed()] {
            let view = DashboardView::compose(&ready(), &compare);
            let charts = view.charts().unwrap();
            assert!(charts.comparison.is_none());
            assert_eq!(charts.type_totals[0].value, 10);
        }
    }

    #[test]
    fn test_view_serialization() {
        let json = serde_json::to_value(DashboardView::loading()).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["message"], LOADING_MESSAGE);

        let json = serde_json::to_value(DashboardView::compose(&ready(), &FetchState::Skipped)).unwrap();
        assert_eq!(json["status"], "ready");
        assert!(json["charts"].get("comparison").is_none());
    }

    #[test]
    fn test_fetch_state_serialization() {
        let json = serde_json::to_value(FetchState::Skipped).unwrap();
        assert_eq!(json, serde_json::json!({"state": "skipped"}));

        let json = serde_json::to_value(failed()).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "timeout");
    }
}
