//! Static file handlers - embedded in binary

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

const JS_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

fn asset(content_type: &'static str, body: &'static str) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Serve embedded CSS
pub async fn serve_css() -> Response {
    asset(
        "text/css; charset=utf-8",
        include_str!("../static/css/style.css"),
    )
}

/// Serve embedded app.js
pub async fn serve_app_js() -> Response {
    asset(JS_CONTENT_TYPE, include_str!("../static/js/app.js"))
}

/// Serve embedded charts.js
pub async fn serve_charts_js() -> Response {
    asset(JS_CONTENT_TYPE, include_str!("../static/js/charts.js"))
}
