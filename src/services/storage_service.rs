//! src/services/storage_service.rs
//!
//! StorageService — durable storage behind the upload relay, backed by
//! SQLite for metadata and local disk for payloads. Payload files are
//! sharded beneath `base_path/{shard}/{shard}/{key}` to keep per-directory
//! file counts low; the metadata table is the source of truth for
//! existence, content type, and upload time.

use crate::models::media::MediaObject;
use bytes::Bytes;
use chrono::Utc;
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Embedded schema for the metadata table. Every statement is written
/// `IF NOT EXISTS`, so applying the script on each boot is safe.
pub const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Apply a schema script statement by statement.
///
/// SQLite's driver executes one statement at a time, so the script is split
/// on `;`. Comment lines are dropped first; a `;` inside a comment must not
/// cut a statement in half.
pub async fn apply_migrations(db: &SqlitePool, sql: &str) -> StorageResult<()> {
    let script = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    let statements: Vec<&str> = script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    debug!("applying {} schema statements", statements.len());
    for stmt in statements {
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

/// StorageService provides the three operations the relay needs:
/// - Put an object (writes bytes to disk and upserts metadata into SQLite)
/// - Get an object (reads metadata from SQLite and opens the payload file)
/// - Delete an object (removes the metadata row and the payload file)
///
/// This struct intentionally keeps a minimal surface area so it is easy to
/// test and reason about. Overwrite semantics are last-write-wins, matching
/// the bucket store it stands in for.
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl StorageService {
    /// Create a new StorageService backed by the provided SQLite pool and
    /// using `base_path` as the root directory for object payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized keys, keys that begin with `/` or contain
    /// `..`, and keys carrying control bytes or backslashes. Callers layer
    /// their own namespace rules on top of this.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Construct a fully-qualified object payload path.
    ///
    /// Combines base_path/{shard}/{shard}/{key}. The key's own slashes
    /// become further directory levels. Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Fetch an object metadata record, or ObjectNotFound.
    async fn fetch_object(&self, key: &str) -> StorageResult<MediaObject> {
        sqlx::query_as::<_, MediaObject>(
            "SELECT id, key, content_type, size_bytes, etag, uploaded_at
             FROM media_objects WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound(key.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    /// Store an object payload and update metadata.
    ///
    /// - Writes bytes to a temporary file next to the final location.
    /// - Computes MD5/etag while writing.
    /// - Atomically renames into place.
    /// - Upserts the metadata row (last-write-wins overwrite semantics).
    ///
    /// Ensures durable writes (fsync) and cleans up temp files on errors.
    pub async fn put_object(
        &self,
        key: &str,
        content_type: Option<String>,
        body: Bytes,
    ) -> StorageResult<MediaObject> {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut digest = Context::new();
        digest.consume(&body);
        if let Err(err) = file.write_all(&body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let etag = format!("{:x}", digest.compute());
        let size_bytes = body.len() as i64;
        let uploaded_at = Utc::now();

        let insert_result = sqlx::query_as::<_, MediaObject>(
            r#"
            INSERT INTO media_objects (id, key, content_type, size_bytes, etag, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                uploaded_at = excluded.uploaded_at
            RETURNING id, key, content_type, size_bytes, etag, uploaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(uploaded_at)
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => Ok(obj),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Fetch an object for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    /// Returns ObjectNotFound if metadata exists but the physical file is
    /// missing.
    pub async fn get_object_reader(&self, key: &str) -> StorageResult<(MediaObject, File)> {
        self.ensure_key_safe(key)?;
        let object = self.fetch_object(key).await?;

        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StorageError::ObjectNotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((object, file))
    }

    /// Delete an object's metadata row and attempt to remove its payload.
    ///
    /// - Removes the metadata row
    /// - Deletes the physical file best-effort
    /// - Prunes empty shard directories
    ///
    /// Returns ObjectNotFound if no row existed; callers decide whether that
    /// counts as failure.
    pub async fn delete_object(&self, key: &str) -> StorageResult<MediaObject> {
        self.ensure_key_safe(key)?;

        let object = sqlx::query_as::<_, MediaObject>(
            "DELETE FROM media_objects WHERE key = ?
             RETURNING id, key, content_type, size_bytes, etag, uploaded_at",
        )
        .bind(key)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;

        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let base = self.base_path.clone();
            self.prune_empty_dirs(parent, &base).await;
        }

        Ok(object)
    }

    /// Recursively remove empty directories up to the storage root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}
