//! Service banner, health check, API document, and the 404 fallback.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "ATS candidate API",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "Service is running",
        "timestamp": Utc::now(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn openapi_yaml() -> impl IntoResponse {
    const SPEC: &str = include_str!("../openapi.yaml");
    ([(header::CONTENT_TYPE, "application/yaml")], SPEC)
}

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
