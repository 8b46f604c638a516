//! Health handler.
//!
//! - GET /health -> liveness plus a server-side timestamp

use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// `GET /health`
///
/// Always returns 200 OK with a small JSON body. This endpoint should be
/// cheap and never perform I/O; uptime monitors poll it aggressively.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            success: true,
            status: "healthy".into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    status: String,
    timestamp: String,
}
