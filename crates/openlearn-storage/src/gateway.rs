//! Storage gateway: object lifecycle for stored course files.
//!
//! The gateway owns the object store client. It derives keys, stages uploads,
//! resolves stored references and batches bulk deletes per bucket. It never
//! touches file records; keeping records and objects in sync is the caller's job.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use openlearn_core::models::{ContextRef, UserId};
use openlearn_core::StorageConfig;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::keys::{self, BlobAddress};
use crate::traits::{BlobStore, BlobStream, StorageError, StorageResult};

const STAGING_FILE_PREFIX: &str = "openlearn-upload-";

/// An object written by [`StorageGateway::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub address: BlobAddress,
    /// Canonical stored reference to persist with the file record
    pub reference: String,
    pub size_bytes: u64,
}

/// Keys of one bucket, deleted in a single batched request. `members`
/// carries the caller's handle for each key, in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketBatch<T> {
    pub bucket: String,
    pub keys: Vec<String>,
    pub members: Vec<T>,
}

#[derive(Debug)]
pub struct BatchFailure<T> {
    pub bucket: String,
    pub members: Vec<T>,
    pub error: StorageError,
}

/// Outcome of [`StorageGateway::delete_many`].
#[derive(Debug)]
pub struct BulkDeleteReport<T> {
    /// Members whose objects are gone (deleted now or already absent)
    pub deleted: Vec<T>,
    pub failures: Vec<BatchFailure<T>>,
}

impl<T> BulkDeleteReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_buckets(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.bucket.as_str()).collect()
    }
}

/// Partition addressed items by bucket.
///
/// Every item lands in its own bucket's batch exactly once, whatever the
/// number of distinct buckets. Batches appear in order of each bucket's first
/// item; keys keep their input order within a batch.
pub fn group_by_bucket<T>(
    items: impl IntoIterator<Item = (T, BlobAddress)>,
) -> Vec<BucketBatch<T>> {
    let mut batches: Vec<BucketBatch<T>> = Vec::new();
    let mut index_by_bucket: HashMap<String, usize> = HashMap::new();

    for (member, address) in items {
        let index = *index_by_bucket
            .entry(address.bucket.clone())
            .or_insert_with(|| {
                batches.push(BucketBatch {
                    bucket: address.bucket.clone(),
                    keys: Vec::new(),
                    members: Vec::new(),
                });
                batches.len() - 1
            });

        batches[index].keys.push(address.key);
        batches[index].members.push(member);
    }

    batches
}

/// Object lifecycle operations over a [`BlobStore`].
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn BlobStore>,
    upload_bucket: String,
    reference_host: String,
    staging_dir: Option<PathBuf>,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn BlobStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            upload_bucket: config.upload_bucket.clone(),
            reference_host: config.reference_host.clone(),
            staging_dir: config.staging_dir.clone(),
        }
    }

    /// Default bucket for uploads and fallback reference decoding
    pub fn bucket(&self) -> &str {
        &self.upload_bucket
    }

    pub fn resolve(&self, reference: &str) -> BlobAddress {
        keys::resolve(reference, &self.upload_bucket)
    }

    /// Stage `body` in a temporary file, then write it to the upload bucket
    /// under the key derived from `context`, `uploader_id` and `filename`.
    ///
    /// The staging file is removed on every exit path. An object with the
    /// same key is overwritten.
    #[tracing::instrument(skip(self, body), fields(bucket = %self.upload_bucket))]
    pub async fn store<R>(
        &self,
        context: ContextRef,
        uploader_id: UserId,
        filename: &str,
        mut body: R,
    ) -> StorageResult<StoredObject>
    where
        R: AsyncRead + Send + Unpin,
    {
        keys::validate_filename(filename)?;
        let address = BlobAddress::new(
            self.upload_bucket.clone(),
            keys::build_key(context, uploader_id, filename),
        );

        let (staged, size_bytes) = self.stage(&mut body).await?;
        self.store
            .put_file(&address.bucket, &address.key, &staged)
            .await?;
        drop(staged);

        let reference = keys::canonical_reference(&self.reference_host, &address);
        Ok(StoredObject {
            address,
            reference,
            size_bytes,
        })
    }

    async fn stage<R>(&self, body: &mut R) -> StorageResult<(TempPath, u64)>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_FILE_PREFIX);
        let staged = match self.staging_dir {
            Some(ref dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let (file, path) = staged.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let size = tokio::io::copy(body, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to stage upload: {}", e))
        })?;
        file.flush().await?;

        Ok((path, size))
    }

    /// Stream the object a stored reference points at.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, reference: &str) -> StorageResult<BlobStream> {
        let address = self.resolve(reference);
        self.store.get(&address.bucket, &address.key).await
    }

    /// Delete the object a stored reference points at. An absent object is
    /// not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, reference: &str) -> StorageResult<BlobAddress> {
        let address = self.resolve(reference);
        self.store.delete(&address.bucket, &address.key).await?;
        Ok(address)
    }

    /// Delete many objects with one batched request per bucket. Batches run
    /// concurrently; a failing batch does not stop the others.
    #[tracing::instrument(skip(self, targets), fields(count = targets.len()))]
    pub async fn delete_many<T>(&self, targets: Vec<(T, String)>) -> BulkDeleteReport<T>
    where
        T: Send,
    {
        let batches = group_by_bucket(
            targets
                .into_iter()
                .map(|(member, reference)| (member, self.resolve(&reference))),
        );
        tracing::debug!(buckets = batches.len(), "Grouped bulk delete by bucket");

        let results = join_all(batches.into_iter().map(|batch| async move {
            let result = self.store.delete_batch(&batch.bucket, &batch.keys).await;
            (batch, result)
        }))
        .await;

        let mut report = BulkDeleteReport {
            deleted: Vec::new(),
            failures: Vec::new(),
        };
        for (batch, result) in results {
            match result {
                Ok(()) => report.deleted.extend(batch.members),
                Err(error) => {
                    tracing::warn!(
                        bucket = %batch.bucket,
                        key_count = batch.keys.len(),
                        error = %error,
                        "Bulk delete batch failed"
                    );
                    report.failures.push(BatchFailure {
                        bucket: batch.bucket,
                        members: batch.members,
                        error,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectStoreBlobStore, StorageBackend};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use std::sync::Mutex;

    fn address(bucket: &str, key: &str) -> BlobAddress {
        BlobAddress::new(bucket, key)
    }

    #[test]
    fn test_group_by_bucket_partitions_multiple_buckets() {
        let batches = group_by_bucket(vec![
            (1, address("bucket-x", "k1")),
            (2, address("bucket-y", "k2")),
            (3, address("bucket-x", "k3")),
        ]);

        assert_eq!(
            batches,
            vec![
                BucketBatch {
                    bucket: "bucket-x".to_string(),
                    keys: vec!["k1".to_string(), "k3".to_string()],
                    members: vec![1, 3],
                },
                BucketBatch {
                    bucket: "bucket-y".to_string(),
                    keys: vec!["k2".to_string()],
                    members: vec![2],
                },
            ]
        );
    }

    #[test]
    fn test_group_by_bucket_single_bucket() {
        let batches = group_by_bucket(vec![
            ("a", address("uploads", "k1")),
            ("b", address("uploads", "k2")),
        ]);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].keys, vec!["k1", "k2"]);
        assert_eq!(batches[0].members, vec!["a", "b"]);
    }

    #[test]
    fn test_group_by_bucket_empty() {
        let batches = group_by_bucket(Vec::<((), BlobAddress)>::new());
        assert!(batches.is_empty());
    }

    /// Records batch calls and fails writes or batches for chosen buckets.
    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<(String, Vec<String>)>>,
        failing_buckets: Vec<String>,
        fail_puts: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn put(&self, _bucket: &str, _key: &str, _data: Bytes) -> StorageResult<()> {
            if self.fail_puts {
                return Err(StorageError::UploadFailed("quota exceeded".to_string()));
            }
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> StorageResult<BlobStream> {
            Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
            self.batches
                .lock()
                .unwrap()
                .push((bucket.to_string(), keys.to_vec()));
            if self.failing_buckets.iter().any(|b| b == bucket) {
                return Err(StorageError::DeleteFailed("access denied".to_string()));
            }
            Ok(())
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Memory
        }
    }

    fn staging_config(dir: &std::path::Path) -> StorageConfig {
        let mut config = StorageConfig::in_memory("uploads");
        config.staging_dir = Some(dir.to_path_buf());
        config
    }

    fn staging_dir_is_empty(dir: &std::path::Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_store_writes_object_and_returns_reference() {
        let staging = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStoreBlobStore::in_memory());
        let gateway = StorageGateway::new(store.clone(), &staging_config(staging.path()));

        let stored = gateway
            .store(ContextRef::PortfolioEntry(7), 3, "essay.docx", &b"my essay"[..])
            .await
            .unwrap();

        assert_eq!(stored.address, address("uploads", "p_7/3/essay.docx"));
        assert_eq!(
            stored.reference,
            "https://s3.amazonaws.com/uploads/p_7/3/essay.docx"
        );
        assert_eq!(stored.size_bytes, 8);
        assert!(staging_dir_is_empty(staging.path()));

        let chunks: Vec<Bytes> = gateway
            .fetch(&stored.reference)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"my essay");
    }

    #[tokio::test]
    async fn test_store_overwrites_same_name_in_same_context() {
        let store = Arc::new(ObjectStoreBlobStore::in_memory());
        let gateway = StorageGateway::new(store, &StorageConfig::in_memory("uploads"));

        let first = gateway
            .store(ContextRef::GradedWork(1), 2, "a.txt", &b"first"[..])
            .await
            .unwrap();
        let second = gateway
            .store(ContextRef::GradedWork(1), 2, "a.txt", &b"second"[..])
            .await
            .unwrap();
        assert_eq!(first.reference, second.reference);

        let chunks: Vec<Bytes> = gateway
            .fetch(&second.reference)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"second");
    }

    #[tokio::test]
    async fn test_failed_write_is_reported_and_staging_released() {
        let staging = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore {
            fail_puts: true,
            ..Default::default()
        });
        let gateway = StorageGateway::new(store, &staging_config(staging.path()));

        let result = gateway
            .store(ContextRef::GradedWork(4), 3, "report.pdf", &b"pdf"[..])
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(staging_dir_is_empty(staging.path()));
    }

    #[tokio::test]
    async fn test_store_rejects_path_in_filename() {
        let store = Arc::new(ObjectStoreBlobStore::in_memory());
        let gateway = StorageGateway::new(store, &StorageConfig::in_memory("uploads"));

        let result = gateway
            .store(ContextRef::GradedWork(4), 3, "../escape.txt", &b"x"[..])
            .await;
        assert!(matches!(result, Err(StorageError::InvalidFilename(_))));
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let store = Arc::new(ObjectStoreBlobStore::in_memory());
        let gateway = StorageGateway::new(store, &StorageConfig::in_memory("uploads"));

        let result = gateway
            .fetch("https://s3.amazonaws.com/uploads/a_1/2/gone.pdf")
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_uses_fallback_bucket() {
        let store = Arc::new(ObjectStoreBlobStore::in_memory());
        let gateway = StorageGateway::new(store, &StorageConfig::in_memory("uploads"));

        let deleted = gateway.delete("legacy/42/report.pdf").await.unwrap();
        assert_eq!(deleted, address("uploads", "42/report.pdf"));
    }

    #[tokio::test]
    async fn test_delete_many_issues_one_batch_per_bucket() {
        let store = Arc::new(RecordingStore::default());
        let gateway = StorageGateway::new(store.clone(), &StorageConfig::in_memory("uploads"));

        let report = gateway
            .delete_many(vec![
                (1, "https://s3.amazonaws.com/bucket-x/k1".to_string()),
                (2, "https://s3.amazonaws.com/bucket-y/k2".to_string()),
                (3, "https://s3.amazonaws.com/bucket-x/k3".to_string()),
            ])
            .await;

        assert!(report.is_complete());
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec![1, 2, 3]);

        let mut batches = store.batches.lock().unwrap().clone();
        batches.sort();
        assert_eq!(
            batches,
            vec![
                ("bucket-x".to_string(), vec!["k1".to_string(), "k3".to_string()]),
                ("bucket-y".to_string(), vec!["k2".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_many_reports_failed_bucket() {
        let store = Arc::new(RecordingStore {
            failing_buckets: vec!["bucket-y".to_string()],
            ..Default::default()
        });
        let gateway = StorageGateway::new(store, &StorageConfig::in_memory("uploads"));

        let report = gateway
            .delete_many(vec![
                (1, "https://s3.amazonaws.com/bucket-x/k1".to_string()),
                (2, "https://s3.amazonaws.com/bucket-y/k2".to_string()),
            ])
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.deleted, vec![1]);
        assert_eq!(report.failed_buckets(), vec!["bucket-y"]);
        assert_eq!(report.failures[0].members, vec![2]);
    }
}
