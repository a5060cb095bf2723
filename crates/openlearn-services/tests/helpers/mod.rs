//! Test helpers: in-memory collaborators for `ScopedFileService`.
//!
//! Run from workspace root: `cargo test -p openlearn-services`.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use openlearn_core::models::{ContextRef, FileId, FileRecord, NewFileRecord, OwningContext};
use openlearn_core::{AppError, StorageConfig};
use openlearn_db::{ContextDirectory, FileRepository};
use openlearn_services::ScopedFileService;
use openlearn_storage::{
    BlobStore, BlobStream, ObjectStoreBlobStore, StorageBackend, StorageError, StorageGateway,
    StorageResult,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const UPLOAD_BUCKET: &str = "openlearn-test-uploads";

/// File records kept in memory, with switchable persist failure.
#[derive(Default)]
pub struct InMemoryFileRepository {
    records: Mutex<BTreeMap<FileId, FileRecord>>,
    next_id: AtomicI64,
    pub fail_persist: AtomicBool,
}

impl InMemoryFileRepository {
    pub fn insert(&self, record: NewFileRecord) -> FileRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = record.with_id(id);
        self.records.lock().unwrap().insert(id, record.clone());
        record
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.records.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn find(&self, id: FileId) -> Result<Option<FileRecord>, AppError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_many(&self, ids: &[FileId]) -> Result<Vec<FileRecord>, AppError> {
        let records = self.records.lock().unwrap();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn find_by_context(&self, context: ContextRef) -> Result<Vec<FileRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.context_ref() == Some(context))
            .cloned()
            .collect())
    }

    async fn persist(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection refused".to_string()));
        }
        Ok(self.insert(record))
    }

    async fn remove(&self, id: FileId) -> Result<bool, AppError> {
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }

    async fn remove_many(&self, ids: &[FileId]) -> Result<u64, AppError> {
        let mut records = self.records.lock().unwrap();
        Ok(ids.iter().filter(|id| records.remove(*id).is_some()).count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryContextDirectory {
    contexts: Mutex<HashMap<ContextRef, OwningContext>>,
}

impl InMemoryContextDirectory {
    pub fn add(&self, context: OwningContext) {
        self.contexts
            .lock()
            .unwrap()
            .insert(context.context_ref(), context);
    }

    pub fn remove(&self, context: ContextRef) {
        self.contexts.lock().unwrap().remove(&context);
    }
}

#[async_trait]
impl ContextDirectory for InMemoryContextDirectory {
    async fn resolve_owning_context(
        &self,
        context: ContextRef,
    ) -> Result<Option<OwningContext>, AppError> {
        Ok(self.contexts.lock().unwrap().get(&context).cloned())
    }
}

/// In-memory object store that records batch deletes and can fail writes or
/// whole buckets on demand.
pub struct TestBlobStore {
    inner: ObjectStoreBlobStore,
    pub fail_puts: AtomicBool,
    failing_buckets: Mutex<HashSet<String>>,
    batches: Mutex<Vec<(String, Vec<String>)>>,
}

impl TestBlobStore {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreBlobStore::in_memory(),
            fail_puts: AtomicBool::new(false),
            failing_buckets: Mutex::new(HashSet::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_bucket(&self, bucket: &str) {
        self.failing_buckets
            .lock()
            .unwrap()
            .insert(bucket.to_string());
    }

    /// Batch delete calls so far, sorted by bucket.
    pub fn batches(&self) -> Vec<(String, Vec<String>)> {
        let mut batches = self.batches.lock().unwrap().clone();
        batches.sort();
        batches
    }

    pub async fn read(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let chunks: Vec<Bytes> = self.inner.get(bucket, key).await?.try_collect().await?;
        Ok(chunks.concat())
    }

    pub async fn exists(&self, bucket: &str, key: &str) -> bool {
        self.inner.get(bucket, key).await.is_ok()
    }

    fn is_failing(&self, bucket: &str) -> bool {
        self.failing_buckets.lock().unwrap().contains(bucket)
    }
}

#[async_trait]
impl BlobStore for TestBlobStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) || self.is_failing(bucket) {
            return Err(StorageError::UploadFailed("service unavailable".to_string()));
        }
        self.inner.put(bucket, key, data).await
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<BlobStream> {
        self.inner.get(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        if self.is_failing(bucket) {
            return Err(StorageError::DeleteFailed("access denied".to_string()));
        }
        self.inner.delete(bucket, key).await
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        self.batches
            .lock()
            .unwrap()
            .push((bucket.to_string(), keys.to_vec()));
        if self.is_failing(bucket) {
            return Err(StorageError::DeleteFailed("access denied".to_string()));
        }
        self.inner.delete_batch(bucket, keys).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Service wired to in-memory collaborators, plus handles to inspect them.
pub struct TestContext {
    pub service: ScopedFileService,
    pub files: Arc<InMemoryFileRepository>,
    pub contexts: Arc<InMemoryContextDirectory>,
    pub store: Arc<TestBlobStore>,
    pub staging_dir: TempDir,
}

impl TestContext {
    /// Stored reference for an object in `bucket` with the default host.
    pub fn reference(&self, bucket: &str, key: &str) -> String {
        format!("https://s3.amazonaws.com/{}/{}", bucket, key)
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging_dir.path())
            .unwrap()
            .next()
            .is_none()
    }
}

pub fn setup() -> TestContext {
    let staging_dir = tempfile::tempdir().expect("Failed to create staging directory");
    let mut config = StorageConfig::in_memory(UPLOAD_BUCKET);
    config.staging_dir = Some(staging_dir.path().to_path_buf());

    let files = Arc::new(InMemoryFileRepository::default());
    let contexts = Arc::new(InMemoryContextDirectory::default());
    let store = Arc::new(TestBlobStore::new());

    let gateway = StorageGateway::new(store.clone(), &config);
    let service = ScopedFileService::new(files.clone(), contexts.clone(), gateway);

    TestContext {
        service,
        files,
        contexts,
        store,
        staging_dir,
    }
}
