//! Bearer-token JSON client for the backend REST API.
//!
//! The upload pipeline needs exactly three calls: create a post referencing
//! an uploaded file, and list/create categories. The rest of the backend
//! surface is someone else's concern.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credentials and identity for the current session, threaded explicitly
/// into the components that need them rather than read from ambient state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
}

impl AuthContext {
    /// Prefix for generated upload names; a fixed literal when anonymous.
    pub fn upload_prefix(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or("post")
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
}

/// Payload for creating a post. `image` carries the stored file name
/// returned by the upload client, never bytes and never a URL.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub categories: Vec<String>,
    pub location: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
}

/// Thin client over the backend's JSON API.
#[derive(Debug, Clone)]
pub struct BackendApi {
    http: Client,
    api_url: String,
}

impl BackendApi {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.api_url.trim_end_matches('/'), path)
    }

    /// POST /api/posts — create a post (protected).
    pub async fn create_post(
        &self,
        auth: &AuthContext,
        post: &NewPost,
    ) -> Result<serde_json::Value, ApiError> {
        let mut request = self.http.post(self.endpoint("posts")).json(post);
        if let Some(token) = auth.token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))
    }

    /// GET /api/categories — list known categories.
    pub async fn list_categories(&self) -> Result<Vec<CategoryRecord>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("categories"))
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))
    }

    /// POST /api/categories — create a category (protected).
    pub async fn create_category(
        &self,
        auth: &AuthContext,
        name: &str,
    ) -> Result<CategoryRecord, ApiError> {
        let mut request = self
            .http
            .post(self.endpoint("categories"))
            .json(&CategoryRecord {
                name: name.to_string(),
            });
        if let Some(token) = auth.token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))
    }
}

/// Turn a non-success response into `Rejected`, preferring the backend's
/// own `message` field, then the raw body, then a fixed fallback.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.text().await {
        Ok(text) if !text.is_empty() => serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(text),
        _ => "Request failed".to_string(),
    };

    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}
