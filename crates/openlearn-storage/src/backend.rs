use crate::traits::{BlobStore, BlobStream, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, WriteMultipart};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncReadExt;

/// Files above this size are uploaded in parts instead of in one request
const MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;
const MULTIPART_CHUNK_SIZE: usize = 5 * 1024 * 1024;
const MAX_PARTS_IN_FLIGHT: usize = 4;
const READ_BUFFER_SIZE: usize = 64 * 1024;

type StoreFactory = Box<dyn Fn(&str) -> StorageResult<Arc<dyn ObjectStore>> + Send + Sync>;

/// `BlobStore` over the `object_store` crate.
///
/// `object_store` clients are bound to a single bucket, so one client is
/// built per bucket on first use and cached for the lifetime of the store.
pub struct ObjectStoreBlobStore {
    backend: StorageBackend,
    factory: StoreFactory,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreBlobStore {
    /// S3 (or S3-compatible) storage.
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(region: String, endpoint_url: Option<String>) -> Self {
        let factory = move |bucket: &str| -> StorageResult<Arc<dyn ObjectStore>> {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(bucket);

            if let Some(ref endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            Ok(Arc::new(store))
        };

        Self::with_factory(StorageBackend::S3, factory)
    }

    /// Local filesystem storage, one directory per bucket under `base_path`.
    pub fn local(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let factory = move |bucket: &str| -> StorageResult<Arc<dyn ObjectStore>> {
            let bucket_path = base_path.join(bucket);
            std::fs::create_dir_all(&bucket_path)?;
            let store = LocalFileSystem::new_with_prefix(&bucket_path)
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            Ok(Arc::new(store))
        };

        Ok(Self::with_factory(StorageBackend::Local, factory))
    }

    /// In-memory storage; every bucket starts empty.
    pub fn in_memory() -> Self {
        Self::with_factory(StorageBackend::Memory, |_bucket: &str| {
            Ok(Arc::new(InMemory::new()) as Arc<dyn ObjectStore>)
        })
    }

    pub fn with_factory<F>(backend: StorageBackend, factory: F) -> Self
    where
        F: Fn(&str) -> StorageResult<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    {
        Self {
            backend,
            factory: Box::new(factory),
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn store_for(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "'{}' is not a valid bucket name",
                bucket
            )));
        }

        if let Some(store) = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
        {
            return Ok(Arc::clone(store));
        }

        let store = (self.factory)(bucket)?;
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            stores.entry(bucket.to_string()).or_insert(store),
        ))
    }
}

fn location(key: &str) -> StorageResult<Path> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    Ok(Path::from(key))
}

async fn copy_into_upload(writer: &mut WriteMultipart, path: &FsPath) -> StorageResult<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        writer
            .wait_for_capacity(MAX_PARTS_IN_FLIGHT)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        writer.write(&buf[..read]);
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()> {
        let store = self.store_for(bucket)?;
        let location = location(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &FsPath) -> StorageResult<u64> {
        let size = tokio::fs::metadata(path).await?.len();
        if size <= MULTIPART_THRESHOLD {
            let data = tokio::fs::read(path).await?;
            self.put(bucket, key, Bytes::from(data)).await?;
            return Ok(size);
        }

        let store = self.store_for(bucket)?;
        let location = location(key)?;
        let start = std::time::Instant::now();

        let upload = store
            .put_multipart(&location)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, MULTIPART_CHUNK_SIZE);

        let result = match copy_into_upload(&mut writer, path).await {
            Ok(()) => writer
                .finish()
                .await
                .map(|_| ())
                .map_err(|e| StorageError::UploadFailed(e.to_string())),
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!(
                        error = %abort,
                        bucket = %bucket,
                        key = %key,
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        };

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Multipart upload failed"
            );
            return Err(e);
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Multipart upload successful"
        );

        Ok(size)
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<BlobStream> {
        let store = self.store_for(bucket)?;
        let location = location(key)?;
        let start = std::time::Instant::now();

        let result = store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", bucket, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bucket = bucket.to_string();
        let key = key.to_string();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Object stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(stream.boxed())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let store = self.store_for(bucket)?;
        let location = location(key)?;
        let start = std::time::Instant::now();

        match store.delete(&location).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                tracing::debug!(bucket = %bucket, key = %key, "Object already absent");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(())
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let store = self.store_for(bucket)?;
        let locations = keys
            .iter()
            .map(|key| location(key).map(Ok::<Path, ObjectStoreError>))
            .collect::<StorageResult<Vec<_>>>()?;
        let start = std::time::Instant::now();

        let mut results = store.delete_stream(futures::stream::iter(locations).boxed());
        let mut missing = 0usize;
        while let Some(result) = results.next().await {
            match result {
                Ok(_) => {}
                Err(ObjectStoreError::NotFound { .. }) => missing += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key_count = keys.len(),
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Batch delete failed"
                    );
                    return Err(StorageError::DeleteFailed(e.to_string()));
                }
            }
        }

        tracing::info!(
            bucket = %bucket,
            key_count = keys.len(),
            already_absent = missing,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
