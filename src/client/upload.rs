//! File validation, storage-key generation, and the relay upload client.
//!
//! Validation runs here first so the user gets feedback without a network
//! round-trip; the relay re-checks everything server-side and remains the
//! authoritative gate.

use std::time::Duration;

use chrono::Local;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    media::MediaFile,
    policy::{KEY_NAMESPACE, UploadPolicy},
};

/// Default per-request timeout for relay calls. Large videos on slow links
/// need headroom, but the UI must never hang indefinitely.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("No file provided")]
    NoFile,
    #[error("File size exceeds {0}MB limit")]
    FileTooLarge(f64),
    #[error("Unsupported file type `{0}`")]
    UnsupportedType(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("relay rejected request ({status}): {message}")]
    RelayRejected { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("upload relay URL not configured")]
    MissingRelayUrl,
}

/// Client-side gate applied before any network traffic.
///
/// Check order is fixed: presence, then size, then type. An oversized file
/// reports `FileTooLarge` even when its type is also wrong.
pub fn validate(file: Option<&MediaFile>, policy: &UploadPolicy) -> Result<(), ValidationError> {
    let file = file
        .filter(|f| !f.is_empty())
        .ok_or(ValidationError::NoFile)?;
    if file.size() > policy.max_bytes {
        return Err(ValidationError::FileTooLarge(policy.max_megabytes()));
    }
    if !policy.allows(&file.content_type, &file.name) {
        return Err(ValidationError::UnsupportedType(file.content_type.clone()));
    }
    Ok(())
}

/// Derive the stored file name for an upload:
/// `{prefix}_{YYYYMMDD_HHmmss}_{8 random alphanumerics}.{ext}`.
///
/// The timestamp gives rough chronological sortability and debuggability;
/// the random suffix is the actual collision guard. The extension is the
/// original name's final dot-segment, lowercased. Nothing checks the store
/// for an existing key; a same-second same-suffix collision overwrites.
pub fn generate_file_name(prefix: &str, original_name: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let random: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let extension = original_name.rsplit('.').next().unwrap_or("").to_lowercase();
    format!("{}_{}_{}.{}", prefix, timestamp, random, extension)
}

/// Storage key for a file name: the fixed namespace plus the name.
pub fn object_key_for(file_name: &str) -> String {
    format!("{}{}", KEY_NAMESPACE, file_name)
}

/// HTTP client for the upload relay.
///
/// Owns local validation and key generation. Returns the bare file name on
/// success; that name, not a URL and not the namespaced key, is what gets
/// stored in application records.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: Client,
    relay_url: String,
    policy: UploadPolicy,
    timeout: Duration,
}

impl UploadClient {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            relay_url: relay_url.into(),
            policy: UploadPolicy::client_default(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<String, UploadError> {
        let base = self.relay_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(UploadError::MissingRelayUrl);
        }
        Ok(format!("{}/{}", base, path))
    }

    /// Upload a file under a freshly generated name and return that name.
    ///
    /// Exactly one object is written per successful call and none on any
    /// failure path. No retries at this layer: failures surface to the
    /// caller, and the user decides whether to re-submit.
    pub async fn upload(&self, file: &MediaFile, prefix: &str) -> Result<String, UploadError> {
        validate(Some(file), &self.policy)?;

        let file_name = generate_file_name(prefix, &file.name);
        let key = object_key_for(&file_name);
        let url = self.endpoint("upload")?;

        debug!(key = %key, size = file.size(), "uploading media object");

        let response = self
            .http
            .post(&url)
            .query(&[("key", key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, file.content_type.clone())
            .body(file.bytes.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = relay_error_message(response).await;
            return Err(UploadError::RelayRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(file_name)
    }

    /// Delete a previously uploaded object. Accepts a bare file name or a
    /// full key; the namespace is prepended when missing.
    pub async fn delete(&self, file_name: &str) -> Result<(), UploadError> {
        if file_name.is_empty() {
            return Err(ValidationError::NoFile.into());
        }
        let key = if file_name.starts_with(KEY_NAMESPACE) {
            file_name.to_string()
        } else {
            object_key_for(file_name)
        };
        let url = self.endpoint("delete")?;

        let response = self
            .http
            .delete(&url)
            .query(&[("key", key.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = relay_error_message(response).await;
            return Err(UploadError::RelayRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Pull the `error` field out of a relay failure body, falling back to the
/// raw body text, falling back to the status line.
async fn relay_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.is_empty() => serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(text),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn jpeg(size: usize) -> MediaFile {
        MediaFile::new("run.jpg", "image/jpeg", vec![0u8; size])
    }

    #[test]
    fn validate_rejects_missing_and_empty_files() {
        let policy = UploadPolicy::client_default();
        assert_eq!(validate(None, &policy), Err(ValidationError::NoFile));
        let empty = MediaFile::new("x.png", "image/png", Vec::new());
        assert_eq!(validate(Some(&empty), &policy), Err(ValidationError::NoFile));
    }

    #[test]
    fn validate_reports_size_before_type() {
        let policy = UploadPolicy::client_default().with_max_bytes(1024);
        let big_and_wrong = MediaFile::new("a.zip", "application/zip", vec![0u8; 2048]);
        assert_eq!(
            validate(Some(&big_and_wrong), &policy),
            Err(ValidationError::FileTooLarge(policy.max_megabytes()))
        );

        let wrong = MediaFile::new("a.zip", "application/zip", vec![0u8; 10]);
        assert_eq!(
            validate(Some(&wrong), &policy),
            Err(ValidationError::UnsupportedType("application/zip".into()))
        );

        assert!(validate(Some(&jpeg(512)), &policy).is_ok());
    }

    #[test]
    fn generated_names_follow_the_pattern() {
        let name = generate_file_name("post", "Powder Day.JPG");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "jpg");

        let parts: Vec<&str> = stem.split('_').collect();
        assert_eq!(parts[0], "post");
        assert_eq!(parts[1].len(), 8, "date part: {}", parts[1]);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6, "time part: {}", parts[2]);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_names_differ_within_a_second() {
        let a = generate_file_name("post", "a.png");
        let b = generate_file_name("post", "a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn extension_falls_back_to_whole_name_without_a_dot() {
        let name = generate_file_name("post", "HEICDUMP");
        assert!(name.ends_with(".heicdump"));
    }

    #[test]
    fn object_key_carries_the_namespace() {
        assert_eq!(object_key_for("post_x.jpg"), "uploads/post_x.jpg");
    }

    #[tokio::test]
    async fn upload_returns_bare_file_name() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_query(Matcher::Regex("uploads.*post_.*\\.jpg".into()))
            .match_header("content-type", "image/jpeg")
            .with_status(200)
            .with_body(r#"{"success":true,"message":"File uploaded successfully","key":"uploads/x"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        let name = client.upload(&jpeg(64), "post").await.unwrap();
        assert!(name.starts_with("post_"));
        assert!(name.ends_with(".jpg"));
        assert!(!name.starts_with("uploads/"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn relay_rejection_surfaces_status_and_error_field() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(413)
            .with_body(r#"{"success":false,"error":"File too large. Maximum size is 10MB"}"#)
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        let err = client.upload(&jpeg(64), "post").await.unwrap_err();
        match err {
            UploadError::RelayRejected { status, message } => {
                assert_eq!(status, 413);
                assert_eq!(message, "File too large. Maximum size is 10MB");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_file_never_reaches_the_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        let wrong = MediaFile::new("a.zip", "application/zip", vec![0u8; 10]);
        let err = client.upload(&wrong, "post").await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_prepends_namespace_for_bare_names() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/delete")
            .match_query(Matcher::UrlEncoded("key".into(), "uploads/post_a.jpg".into()))
            .with_status(200)
            .with_body(r#"{"success":true,"message":"File deleted successfully","key":"uploads/post_a.jpg"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        client.delete("post_a.jpg").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_relay_url_fails_without_network() {
        let client = UploadClient::new("");
        let err = client.upload(&jpeg(16), "post").await.unwrap_err();
        assert!(matches!(err, UploadError::MissingRelayUrl));
    }
}
