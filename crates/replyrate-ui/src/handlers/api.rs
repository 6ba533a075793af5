//! JSON API handlers

use crate::AppState;
use crate::models::{ApiError, DashboardResponse, FilterForm, ResolveResponse, default_compare_value};
use crate::session::PageSession;
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use replyrate_core::{FilterSelection, period::DATE_FORMAT};
use serde::{Deserialize, Serialize};

/// This page's filter selection
pub async fn get_filters(Extension(session): Extension<PageSession>) -> Json<FilterSelection> {
    Json(session.controller.filters())
}

#[derive(Debug, Serialize)]
pub struct FilterUpdateResponse {
    /// False when the posted selection equals the current one
    pub changed: bool,
    pub filters: FilterSelection,
}

/// Commit a new selection; the refresh follows after the debounce window
pub async fn update_filters(
    State(state): State<AppState>,
    Extension(session): Extension<PageSession>,
    Json(form): Json<FilterForm>,
) -> Result<Json<FilterUpdateResponse>, ApiError> {
    let selection = form.into_selection(&state.dashboard)?;
    let changed = session.controller.submit(selection.clone());
    Ok(Json(FilterUpdateResponse {
        changed,
        filters: selection,
    }))
}

/// Latest snapshot published for this page
pub async fn dashboard(Extension(session): Extension<PageSession>) -> Json<DashboardResponse> {
    let snapshot = session.controller.snapshot();
    Json(DashboardResponse::from(&snapshot))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    period: String,
    #[serde(default = "default_compare_value")]
    period_compare: String,
}

/// Preview the ranges a period pair resolves to today
pub async fn resolve(
    Extension(session): Extension<PageSession>,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let controller = &session.controller;
    let current = controller.filters();
    let selection = FilterSelection::new(
        current.user,
        params.period.parse()?,
        params.period_compare.parse()?,
    );
    let ranges = controller.resolve(&selection)?;
    Ok(Json(ResolveResponse {
        today: controller.today().format(DATE_FORMAT).to_string(),
        week_start: controller.config().week_start,
        ranges,
    }))
}

#[cfg(test)]
mod tests {
    use crate::controller::{ControllerConfig, DashboardController};
    use crate::models::{DashboardConfig, UserEntry};
    use crate::server::{UiConfig, UiServer};
    use crate::session::{DashboardSessions, SESSION_COOKIE};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use replyrate_core::{AggregateCounts, AggregateSource, PeriodQuery, Result};
    use replyrate_observability::{HealthState, Metrics};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct FixedSource;

    #[async_trait]
    impl AggregateSource for FixedSource {
        async fn fetch_counts(&self, _query: &PeriodQuery) -> Result<AggregateCounts> {
            Ok(AggregateCounts {
                email_success: 7,
                email_failure: 3,
                message_success: 10,
                message_failure: 0,
                inmail_success: 2,
                inmail_failure: 8,
            })
        }
    }

    fn alice() -> Uuid {
        Uuid::from_u128(0xa11ce)
    }

    fn app() -> (Router, Arc<DashboardSessions>) {
        let dashboard = DashboardConfig {
            users: vec![
                UserEntry {
                    id: alice(),
                    label: "Alice".to_string(),
                },
                UserEntry {
                    id: Uuid::from_u128(0xb0b),
                    label: "Bob".to_string(),
                },
            ],
            ..Default::default()
        };
        let metrics = Arc::new(Metrics::new().unwrap());
        let sessions = Arc::new(DashboardSessions::new(
            Arc::new(FixedSource),
            dashboard.initial_selection().unwrap(),
            ControllerConfig {
                debounce: Duration::from_millis(10),
                fixed_today: NaiveDate::from_ymd_opt(2025, 1, 15),
                ..Default::default()
            },
            Arc::clone(&metrics),
        ));
        let server = UiServer::new(UiConfig::default(), Arc::clone(&sessions), Arc::new(dashboard))
            .with_health(HealthState::new(metrics));
        (server.build_router(), sessions)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=value` part of the session cookie set on `response`
    fn session_cookie(response: &Response) -> Option<String> {
        let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        let pair = value.split(';').next()?.trim();
        pair.starts_with(SESSION_COOKIE).then(|| pair.to_string())
    }

    fn session_id(cookie: &str) -> Uuid {
        cookie.split_once('=').unwrap().1.parse().unwrap()
    }

    fn controller(sessions: &DashboardSessions, cookie: &str) -> Arc<DashboardController> {
        sessions.touch(&session_id(cookie)).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Open a session and return its cookie
    async fn open_session(router: &Router) -> String {
        let response = router.clone().oneshot(get("/api/filters", None)).await.unwrap();
        session_cookie(&response).unwrap()
    }

    #[tokio::test]
    async fn test_get_filters_returns_defaults() {
        let (router, _) = app();
        let response = router.oneshot(get("/api/filters", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_some());

        let json = body_json(response).await;
        assert_eq!(json["user"], alice().to_string());
        assert_eq!(json["period"], "current_month");
        assert_eq!(json["period_compare"], "none");
    }

    #[tokio::test]
    async fn test_known_session_is_reused() {
        let (router, sessions) = app();
        let cookie = open_session(&router).await;

        let response = router
            .clone()
            .oneshot(get("/api/filters", Some(&cookie)))
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let other = open_session(&router).await;
        assert_ne!(other, cookie);
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_post_filters_updates_selection() {
        let (router, sessions) = app();
        let body = serde_json::json!({
            "user": alice().to_string(),
            "period": "last_month",
            "period_compare": "last_week",
        });
        let response = router
            .oneshot(post_json("/api/filters", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).unwrap();

        let json = body_json(response).await;
        assert_eq!(json["changed"], true);
        assert_eq!(json["filters"]["period"], "last_month");
        assert_eq!(
            controller(&sessions, &cookie).filters().period_compare.as_str(),
            "last_week"
        );
    }

    #[tokio::test]
    async fn test_sessions_keep_independent_selections() {
        let (router, sessions) = app();
        let first = open_session(&router).await;
        let second = open_session(&router).await;

        let body = serde_json::json!({
            "user": alice().to_string(),
            "period": "last_month",
        });
        let response = router
            .clone()
            .oneshot(post_json("/api/filters", Some(&first), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(get("/api/filters", Some(&second)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["period"], "current_month");

        let response = router
            .clone()
            .oneshot(get("/api/filters", Some(&first)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["period"], "last_month");

        // The first page's refresh leaves the second page's charts alone
        controller(&sessions, &first)
            .subscribe()
            .wait_for(|s| s.generation == 2 && s.is_settled())
            .await
            .unwrap();
        let response = router
            .oneshot(get("/api/dashboard", Some(&second)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["filters"]["period"], "current_month");
        assert_eq!(json["generation"], 1);
    }

    #[tokio::test]
    async fn test_post_filters_rejects_unknown_period() {
        let (router, sessions) = app();
        let cookie = open_session(&router).await;
        let body = serde_json::json!({
            "user": alice().to_string(),
            "period": "fortnight",
        });
        let response = router
            .oneshot(post_json("/api/filters", Some(&cookie), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("fortnight"));
        assert_eq!(
            controller(&sessions, &cookie).filters().period.as_str(),
            "current_month"
        );
    }

    #[tokio::test]
    async fn test_post_filters_rejects_unknown_user() {
        let (router, _) = app();
        let body = serde_json::json!({
            "user": Uuid::from_u128(42).to_string(),
            "period": "last_week",
        });
        let response = router
            .oneshot(post_json("/api/filters", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_reports_ready_charts() {
        let (router, sessions) = app();
        let cookie = open_session(&router).await;
        controller(&sessions, &cookie)
            .subscribe()
            .wait_for(|s| s.is_settled())
            .await
            .unwrap();

        let response = router
            .oneshot(get("/api/dashboard", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["generation"], 1);
        assert_eq!(json["primary_range"], "[2025-01-01, 2025-02-01)");
        assert!(json["compare_range"].is_null());
        assert_eq!(json["view"]["status"], "ready");
        assert_eq!(json["view"]["charts"]["type_totals"][0]["value"], 10);
        assert_eq!(json["view"]["charts"]["percentages"][1]["value"], 30);
        assert!(json["view"]["charts"].get("comparison").is_none());
    }

    #[tokio::test]
    async fn test_resolve_preview() {
        let (router, _) = app();
        let response = router
            .oneshot(get(
                "/api/resolve?period=last_week&period_compare=last_month",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["today"], "2025-01-15");
        assert_eq!(json["week_start"], "sunday");
        assert_eq!(json["period"]["start_inclusive"], "2025-01-05");
        assert_eq!(json["period"]["end_exclusive"], "2025-01-12");
        assert_eq!(json["period_compare"]["start_inclusive"], "2024-12-01");
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_period() {
        let (router, _) = app();
        let response = router
            .oneshot(get("/api/resolve?period=someday", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_page_renders_filters() {
        let (router, _) = app();
        let response = router.oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_some());

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Alice"));
        assert!(html.contains(r#"value="last_month""#));
        assert!(html.contains("No comparison"));
    }

    #[tokio::test]
    async fn test_form_fallback_redirects() {
        let (router, sessions) = app();
        let response = router.clone().oneshot(get("/", None)).await.unwrap();
        let cookie = session_cookie(&response).unwrap();

        let body = format!("user={}&period=last_week&period_compare=current_week", alice());
        let request = Request::builder()
            .method("POST")
            .uri("/filters")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, &cookie)
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(
            controller(&sessions, &cookie).filters().period.as_str(),
            "last_week"
        );
    }

    #[tokio::test]
    async fn test_static_assets_and_health() {
        let (router, sessions) = app();
        for (uri, content_type) in [
            ("/static/css/style.css", "text/css; charset=utf-8"),
            ("/static/js/app.js", "application/javascript; charset=utf-8"),
            ("/static/js/charts.js", "application/javascript; charset=utf-8"),
        ] {
            let response = router.clone().oneshot(get(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(response.headers()[header::CONTENT_TYPE], content_type);
        }

        let response = router.oneshot(get("/healthz", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sessions.is_empty());
    }
}
