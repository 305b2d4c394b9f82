//! HTTP handlers for spots-api.

pub mod spots;

use axum::response::IntoResponse;
use axum::Json;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
