use axum::{http::header, response::IntoResponse};

const INDEX_HTML: &str = include_str!("../../static/index.html");
const SIGN_UP_JS: &str = include_str!("../../static/sign-up.js");

pub async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

pub async fn sign_up_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        SIGN_UP_JS,
    )
}

/// CORS preflight that reached the handler (the CORS layer answers real
/// preflights itself).
pub async fn preflight() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}
