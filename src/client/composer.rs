//! Post submission: validate, upload the attached media, create the post.
//!
//! One submission at a time. The draft survives a failed attempt so the
//! user can retry; only a fully successful round resets it. An upload whose
//! post creation then fails becomes an orphaned object on the relay, which
//! is logged and the key dropped so the retry uploads fresh.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::client::api::{ApiError, AuthContext, BackendApi, NewPost};
use crate::client::upload::{UploadClient, UploadError};
use crate::models::draft::{FieldError, PostDraft};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    AlreadyInFlight,
    #[error("draft failed validation")]
    Invalid(Vec<FieldError>),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Backend(#[from] ApiError),
}

pub struct PostComposer {
    uploader: UploadClient,
    api: BackendApi,
    auth: AuthContext,
    in_flight: bool,
}

impl PostComposer {
    pub fn new(uploader: UploadClient, api: BackendApi, auth: AuthContext) -> Self {
        Self {
            uploader,
            api,
            auth,
            in_flight: false,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight
    }

    /// Run the full submission. On success the draft is reset and the
    /// created post's JSON is returned. On failure the draft is kept so
    /// nothing the user typed is lost.
    pub async fn submit(&mut self, draft: &mut PostDraft) -> Result<Value, SubmitError> {
        if self.in_flight {
            return Err(SubmitError::AlreadyInFlight);
        }
        self.in_flight = true;
        let result = self.perform(draft).await;
        self.in_flight = false;
        result
    }

    async fn perform(&mut self, draft: &mut PostDraft) -> Result<Value, SubmitError> {
        draft.validate().map_err(SubmitError::Invalid)?;

        let image = if let Some(key) = draft.media_key.clone() {
            Some(key)
        } else if let Some(file) = draft.media_file.as_ref() {
            let name = self
                .uploader
                .upload(file, self.auth.upload_prefix())
                .await?;
            draft.media_key = Some(name.clone());
            Some(name)
        } else {
            None
        };

        let post = NewPost {
            title: draft.title.trim().to_string(),
            content: draft.content.trim().to_string(),
            categories: draft.categories.names().to_vec(),
            location: draft.location.trim().to_string(),
            image,
        };

        match self.api.create_post(&self.auth, &post).await {
            Ok(created) => {
                draft.reset();
                Ok(created)
            }
            Err(err) => {
                // The uploaded object has no post pointing at it now. Drop
                // the key so a retry uploads fresh rather than reusing a
                // name we can no longer vouch for.
                if let Some(key) = draft.media_key.take() {
                    warn!("post create failed, uploaded media `{}` is orphaned", key);
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::MediaFile;
    use mockito::{Matcher, Server};

    fn ready_draft() -> PostDraft {
        PostDraft {
            title: "First tracks".to_string(),
            content: "Untouched powder all morning.".to_string(),
            media_file: Some(MediaFile::new("run.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF])),
            ..PostDraft::default()
        }
    }

    fn composer_for(relay: &Server, backend: &Server) -> PostComposer {
        let auth = AuthContext {
            user_id: Some("rider7".to_string()),
            token: Some("tok-1".to_string()),
            username: None,
        };
        PostComposer::new(
            UploadClient::new(relay.url()),
            BackendApi::new(backend.url()),
            auth,
        )
    }

    #[tokio::test]
    async fn submit_uploads_then_creates_and_resets() {
        let mut relay = Server::new_async().await;
        let upload = relay
            .mock("POST", "/upload")
            .match_query(Matcher::Regex("uploads.*rider7_.*\\.jpg".to_string()))
            .with_status(200)
            .with_body(
                r#"{"success":true,"message":"File uploaded successfully","key":"uploads/x.jpg"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let mut backend = Server::new_async().await;
        let create = backend
            .mock("POST", "/api/posts")
            .match_header("authorization", "Bearer tok-1")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(serde_json::json!({
                    "title": "First tracks",
                    "content": "Untouched powder all morning.",
                })),
                // The stored record carries the bare name, not the full key.
                Matcher::Regex(r#""image":"rider7_"#.to_string()),
            ]))
            .with_status(201)
            .with_body(r#"{"_id":"p1","title":"First tracks"}"#)
            .expect(1)
            .create_async()
            .await;

        let mut composer = composer_for(&relay, &backend);
        let mut draft = ready_draft();

        let created = composer.submit(&mut draft).await.unwrap();
        assert_eq!(created["_id"], "p1");

        assert!(draft.title.is_empty());
        assert!(draft.media_file.is_none());
        assert!(draft.media_key.is_none());
        assert!(!composer.is_submitting());

        upload.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_draft_never_touches_the_network() {
        let mut relay = Server::new_async().await;
        let upload = relay.mock("POST", "/upload").expect(0).create_async().await;
        let mut backend = Server::new_async().await;
        let create = backend
            .mock("POST", "/api/posts")
            .expect(0)
            .create_async()
            .await;

        let mut composer = composer_for(&relay, &backend);
        let mut draft = PostDraft::new();

        match composer.submit(&mut draft).await.unwrap_err() {
            SubmitError::Invalid(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, ["title", "content", "media"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        upload.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn upload_failure_stops_before_the_backend() {
        let mut relay = Server::new_async().await;
        relay
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(413)
            .with_body(r#"{"success":false,"error":"File too large. Maximum size is 10MB"}"#)
            .create_async()
            .await;
        let mut backend = Server::new_async().await;
        let create = backend
            .mock("POST", "/api/posts")
            .expect(0)
            .create_async()
            .await;

        let mut composer = composer_for(&relay, &backend);
        let mut draft = ready_draft();

        match composer.submit(&mut draft).await.unwrap_err() {
            SubmitError::Upload(UploadError::RelayRejected { status, message }) => {
                assert_eq!(status, 413);
                assert_eq!(message, "File too large. Maximum size is 10MB");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(draft.title, "First tracks");
        assert!(draft.media_key.is_none());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn backend_rejection_keeps_the_draft_and_drops_the_upload_key() {
        let mut relay = Server::new_async().await;
        relay
            .mock("POST", "/upload")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"success":true,"message":"File uploaded successfully","key":"uploads/x.jpg"}"#,
            )
            .create_async()
            .await;
        let mut backend = Server::new_async().await;
        backend
            .mock("POST", "/api/posts")
            .with_status(500)
            .with_body(r#"{"message":"db down"}"#)
            .create_async()
            .await;

        let mut composer = composer_for(&relay, &backend);
        let mut draft = ready_draft();

        match composer.submit(&mut draft).await.unwrap_err() {
            SubmitError::Backend(ApiError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Draft survives for a retry; the orphaned key is forgotten.
        assert_eq!(draft.title, "First tracks");
        assert!(draft.media_file.is_some());
        assert!(draft.media_key.is_none());
        assert!(!composer.is_submitting());
    }

    #[tokio::test]
    async fn concurrent_submission_is_refused() {
        let relay = Server::new_async().await;
        let backend = Server::new_async().await;
        let mut composer = composer_for(&relay, &backend);
        composer.in_flight = true;

        let mut draft = ready_draft();
        assert!(matches!(
            composer.submit(&mut draft).await,
            Err(SubmitError::AlreadyInFlight)
        ));
        assert_eq!(draft.title, "First tracks");
    }
}
