use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::render_metrics;
use crate::startup::AppState;

/// Liveness: the process is up and the backing store answers.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.stores.health.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "chat-gateway",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "chat-gateway",
                "error": e.to_string()
            })),
        ),
    }
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.stores.health.health_check().await;
    let push = state.push_provider.health_check().await;

    match (store, push) {
        (Ok(_), Ok(_)) => StatusCode::OK,
        (store, push) => {
            if let Err(e) = store {
                tracing::warn!(error = %e, "Store not ready");
            }
            if let Err(e) = push {
                tracing::warn!(error = %e, "Push provider not ready");
            }
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_metrics(),
    )
}
