use crate::{BlobStore, ObjectStoreBlobStore, StorageBackend, StorageError, StorageResult};
use openlearn_core::StorageConfig;
use std::sync::Arc;

/// Create an object store based on configuration
pub fn create_blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            tracing::info!(
                region = %region,
                endpoint = ?config.s3_endpoint,
                bucket = %config.upload_bucket,
                "Using S3 object store"
            );
            Ok(Arc::new(ObjectStoreBlobStore::s3(
                region,
                config.s3_endpoint.clone(),
            )))
        }

        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            tracing::info!(path = %base_path, "Using local filesystem object store");
            Ok(Arc::new(ObjectStoreBlobStore::local(base_path)?))
        }

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; files are lost on restart");
            Ok(Arc::new(ObjectStoreBlobStore::in_memory()))
        }
    }
}
