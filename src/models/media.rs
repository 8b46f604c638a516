use std::io;
use std::path::Path;

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// An in-memory file selected for upload: name, declared media type, payload.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl MediaFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, guessing the media type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            name,
            content_type,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Inline `data:` URL for previewing the file before it is uploaded.
    pub fn preview_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.content_type, encoded)
    }
}

/// Metadata row for an object held by the relay. The payload itself lives on
/// disk; this row is authoritative for existence and headers.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MediaObject {
    pub id: Uuid,
    pub key: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub etag: String,
    pub uploaded_at: DateTime<Utc>,
}
