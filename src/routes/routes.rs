//! Defines routes for the upload relay.
//!
//! ## Structure
//! - `POST   /upload?key=uploads/{name}` — validate and store a media object
//! - `DELETE /delete?key=uploads/{name}` — remove an object (idempotent)
//! - `GET    /file?key=uploads/{name}` — stream an object back
//! - `GET    /health` — liveness check
//!
//! Every response, errors and the fallback included, carries CORS headers so
//! browser clients on other origins can call the relay directly.

use crate::handlers::{
    health_handlers::health,
    relay_handlers::{RelayState, delete_media, fetch_media, not_found, upload_media},
};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post},
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build and return the relay router.
///
/// The router carries shared state (`RelayState`) to all handlers.
/// `allowed_origins` is either `*` or a comma-separated origin list; the
/// resulting CORS layer wraps the routes and the fallback alike.
pub fn routes(allowed_origins: &str) -> Router<RelayState> {
    Router::new()
        .route("/upload", post(upload_media))
        .route("/delete", delete(delete_media))
        .route("/file", get(fetch_media))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400));

    if allowed_origins.trim() == "*" {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(
            allowed_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok()),
        ))
    }
}
