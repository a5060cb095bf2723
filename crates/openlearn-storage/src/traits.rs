//! Object store abstraction trait
//!
//! This module defines the `BlobStore` trait every object store backend must
//! implement. Unlike a single-bucket client, every call names its bucket:
//! stored references may point at buckets other than the configured upload
//! bucket.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use openlearn_core::AppError;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object content as a stream of chunks
pub type BlobStream = BoxStream<'static, StorageResult<Bytes>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(location) => AppError::ObjectMissing(location),
            StorageError::InvalidKey(msg) | StorageError::InvalidFilename(msg) => {
                AppError::InvalidInput(msg)
            }
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object store boundary
///
/// Implementations must be safe for concurrent use by independent requests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write an object, replacing any object already stored under the key
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()>;

    /// Write an object from a local file, returning its size. The default
    /// reads the whole file and calls [`BlobStore::put`].
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.put(bucket, key, Bytes::from(data)).await?;
        Ok(size)
    }

    /// Stream an object's content. A missing object is `StorageError::NotFound`.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<BlobStream>;

    /// Delete an object. Deleting an absent object succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete several objects of one bucket in a single batched request.
    /// Absent objects are skipped without error.
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
