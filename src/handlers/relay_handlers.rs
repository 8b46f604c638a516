//! HTTP handlers for the upload relay endpoints.
//! Upload bodies are buffered (the policy cap keeps memory bounded),
//! downloads are streamed, and storage concerns are delegated to
//! `StorageService`.

use crate::{
    errors::RelayError,
    models::{media::MediaObject, policy::UploadPolicy},
    services::storage_service::{StorageError, StorageService},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::error;

/// Shared state handed to every relay route.
#[derive(Clone)]
pub struct RelayState {
    pub storage: StorageService,
    pub policy: UploadPolicy,
}

/// Query params accepted by the object endpoints.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// POST `/upload?key=uploads/{name}` — validate and store a media object.
///
/// Checks run in a fixed order and the first failure wins: key presence,
/// key shape, media type, size. Nothing touches storage until all pass.
pub async fn upload_media(
    State(state): State<RelayState>,
    Query(q): Query<KeyQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, RelayError> {
    let key = require_key(&q)?;
    ensure_key_shape(&key, &state.policy)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    if !state.policy.allows_type(&content_type) {
        return Err(RelayError::bad_request(
            "Invalid file type. Only images and videos are allowed.",
        ));
    }

    // Declared size first so oversized requests fail before any read.
    if let Some(declared) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if declared > state.policy.max_bytes {
            return Err(file_too_large(&state.policy));
        }
    }

    let body = read_capped(body, &state.policy).await?;

    let object = state
        .storage
        .put_object(&key, Some(content_type), body)
        .await
        .map_err(|err| match err {
            StorageError::InvalidObjectKey => RelayError::bad_request("Invalid key format"),
            other => {
                error!("upload of `{}` failed: {}", key, other);
                RelayError::internal("Upload failed: internal storage error")
            }
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "File uploaded successfully",
        "key": object.key
    })))
}

/// DELETE `/delete?key=uploads/{name}` — remove an object.
///
/// Deleting a key that never existed still reports success, matching the
/// bucket-store semantics callers rely on for retries.
pub async fn delete_media(
    State(state): State<RelayState>,
    Query(q): Query<KeyQuery>,
) -> Result<impl IntoResponse, RelayError> {
    let key = require_key(&q)?;
    ensure_key_shape(&key, &state.policy)?;

    match state.storage.delete_object(&key).await {
        Ok(_) | Err(StorageError::ObjectNotFound(_)) => {}
        Err(StorageError::InvalidObjectKey) => {
            return Err(RelayError::bad_request("Invalid key format"));
        }
        Err(other) => {
            error!("delete of `{}` failed: {}", key, other);
            return Err(RelayError::internal("Delete failed: internal storage error"));
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
        "key": key
    })))
}

/// GET `/file?key=uploads/{name}` — stream an object back.
///
/// Error bodies here are plain text rather than JSON; image and video tags
/// fetch this endpoint directly and render nothing on failure.
pub async fn fetch_media(State(state): State<RelayState>, Query(q): Query<KeyQuery>) -> Response {
    let Some(key) = q.key.as_deref().filter(|k| !k.is_empty()) else {
        return plain_text(StatusCode::BAD_REQUEST, "Missing key parameter");
    };

    let (meta, file) = match state.storage.get_object_reader(key).await {
        Ok(found) => found,
        Err(StorageError::ObjectNotFound(_) | StorageError::InvalidObjectKey) => {
            return plain_text(StatusCode::NOT_FOUND, "File not found");
        }
        Err(err) => {
            error!("fetch of `{}` failed: {}", key, err);
            return plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving file");
        }
    };

    let stream = ReaderStream::new(file);
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_media_headers(response.headers_mut(), &meta);
    response
}

/// Fallback for unknown routes: advertise what the relay serves.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Not found",
            "availableEndpoints": [
                "POST /upload?key=uploads/filename.jpg",
                "DELETE /delete?key=uploads/filename.jpg",
                "GET /file?key=uploads/filename.jpg (optional)",
                "GET /health"
            ]
        })),
    )
}

fn require_key(q: &KeyQuery) -> Result<String, RelayError> {
    q.key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RelayError::bad_request("Missing key parameter"))
}

fn ensure_key_shape(key: &str, policy: &UploadPolicy) -> Result<(), RelayError> {
    if key.contains("..") || !key.starts_with(&policy.key_namespace) {
        return Err(RelayError::bad_request("Invalid key format"));
    }
    Ok(())
}

fn file_too_large(policy: &UploadPolicy) -> RelayError {
    RelayError::payload_too_large(format!(
        "File too large. Maximum size is {}MB",
        policy.max_megabytes()
    ))
}

/// Buffer the request body, bailing out as soon as it crosses the cap.
/// Catches oversized uploads that arrive without a Content-Length header.
async fn read_capped(body: Body, policy: &UploadPolicy) -> Result<Bytes, RelayError> {
    let mut buf = BytesMut::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            error!("failed reading upload body: {}", err);
            RelayError::internal("Upload failed: could not read request body")
        })?;
        if (buf.len() + chunk.len()) as u64 > policy.max_bytes {
            return Err(file_too_large(policy));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn set_media_headers(headers: &mut HeaderMap, meta: &MediaObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    let quoted = format!("\"{}\"", meta.etag);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000"),
    );
}

fn plain_text(status: StatusCode, msg: &'static str) -> Response {
    let mut response = Response::new(Body::from(msg));
    *response.status_mut() = status;
    response
}
