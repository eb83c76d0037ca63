use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

/// Liveness: the process is up. Never touches the provider or the store.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let persistence = if state.chat.persistence().is_some() {
        "enabled"
    } else {
        "disabled"
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "chat-service",
            "version": env!("CARGO_PKG_VERSION"),
            "persistence": persistence
        })),
    )
}

/// Readiness: when persistence is on, the store must be reachable.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let Some(cache) = state.chat.persistence() else {
        return Ok(StatusCode::OK);
    };

    let store = cache.acquire().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check could not reach chat store");
        AppError::ServiceUnavailable
    })?;
    store.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness ping failed");
        AppError::ServiceUnavailable
    })?;

    Ok(StatusCode::OK)
}

/// Prometheus scrape endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        crate::services::metrics::get_metrics(),
    )
}
