//! Scoped file service: authorized store, fetch and delete of course files.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use openlearn_core::models::{
    ContextRef, FileId, FileRecord, NewFileRecord, OwningContext, PortfolioItemId, Principal,
};
use openlearn_core::AppError;
use openlearn_db::{ContextDirectory, FileRepository};
use openlearn_storage::{BlobStream, StorageError, StorageGateway, StoredObject};
use tokio::io::AsyncRead;

use crate::access::{AccessDecision, AccessGate, AccessTarget};

/// Outcome of a completed bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteSummary {
    /// Files whose object and record are both gone
    pub deleted: Vec<FileId>,
    pub records_removed: u64,
}

#[derive(Clone)]
pub struct ScopedFileService {
    files: Arc<dyn FileRepository>,
    contexts: Arc<dyn ContextDirectory>,
    storage: StorageGateway,
    gate: AccessGate,
}

impl ScopedFileService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        contexts: Arc<dyn ContextDirectory>,
        storage: StorageGateway,
    ) -> Self {
        Self {
            files,
            contexts,
            storage,
            gate: AccessGate::new(),
        }
    }

    pub fn storage(&self) -> &StorageGateway {
        &self.storage
    }

    /// Store an upload under `context` on behalf of `principal`.
    ///
    /// The object is written before the record is persisted. If persisting
    /// fails the object is removed again, unless an earlier record of the
    /// same context already points at it.
    #[tracing::instrument(skip(self, principal, body), fields(principal.id = principal.id))]
    pub async fn store_file<R>(
        &self,
        principal: &Principal,
        context: ContextRef,
        filename: &str,
        body: R,
    ) -> Result<FileRecord, AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let owning = self.owning_context(context).await?;
        self.authorize(principal, &AccessTarget::from(&owning), &context)?;

        let stored = self
            .storage
            .store(context, principal.id, filename, body)
            .await?;

        let record = NewFileRecord::for_context(&owning, principal.id, stored.reference.clone());
        match self.files.persist(record).await {
            Ok(record) => {
                tracing::info!(
                    file_id = record.id,
                    bucket = %stored.address.bucket,
                    key = %stored.address.key,
                    size_bytes = stored.size_bytes,
                    "File stored"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    key = %stored.address.key,
                    "Failed to persist file record"
                );
                self.discard_unreferenced(context, &stored).await;
                Err(e)
            }
        }
    }

    /// Record and content of a file. A record whose object is gone yields
    /// `AppError::ObjectMissing`.
    #[tracing::instrument(skip(self, principal), fields(principal.id = principal.id))]
    pub async fn fetch_file(
        &self,
        principal: &Principal,
        file_id: FileId,
    ) -> Result<(FileRecord, BlobStream), AppError> {
        let record = self.authorized_record(principal, file_id).await?;

        match self.storage.fetch(&record.file_url).await {
            Ok(stream) => Ok((record, stream)),
            Err(StorageError::NotFound(location)) => {
                tracing::warn!(
                    file_id = record.id,
                    location = %location,
                    "File record has no stored object"
                );
                Err(AppError::ObjectMissing(format!("file {}", record.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_file(
        &self,
        principal: &Principal,
        file_id: FileId,
    ) -> Result<FileRecord, AppError> {
        self.authorized_record(principal, file_id).await
    }

    #[tracing::instrument(skip(self, principal), fields(principal.id = principal.id))]
    pub async fn list_files(
        &self,
        principal: &Principal,
        context: ContextRef,
    ) -> Result<Vec<FileRecord>, AppError> {
        let owning = self.owning_context(context).await?;
        self.authorize(principal, &AccessTarget::from(&owning), &context)?;
        self.files.find_by_context(context).await
    }

    /// Delete a file's object, then its record. The record is kept when the
    /// object cannot be deleted; an already absent object is not an error.
    #[tracing::instrument(skip(self, principal), fields(principal.id = principal.id))]
    pub async fn delete_file(
        &self,
        principal: &Principal,
        file_id: FileId,
    ) -> Result<(), AppError> {
        let record = self.authorized_record(principal, file_id).await?;

        let address = self.storage.delete(&record.file_url).await?;
        if !self.files.remove(record.id).await? {
            tracing::debug!(file_id = record.id, "File record already removed");
        }

        tracing::info!(
            file_id = record.id,
            bucket = %address.bucket,
            key = %address.key,
            "File deleted"
        );
        Ok(())
    }

    /// Delete several files. Every id is resolved and authorized before
    /// anything is deleted.
    #[tracing::instrument(
        skip(self, principal, file_ids),
        fields(principal.id = principal.id, count = file_ids.len())
    )]
    pub async fn delete_files(
        &self,
        principal: &Principal,
        file_ids: &[FileId],
    ) -> Result<BulkDeleteSummary, AppError> {
        let mut seen = HashSet::new();
        let ids: Vec<FileId> = file_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let records = self.files.find_many(&ids).await?;
        let found: HashSet<FileId> = records.iter().map(|r| r.id).collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(*id)) {
            return Err(AppError::NotFound(format!("file {}", missing)));
        }

        let mut targets: HashMap<Option<ContextRef>, Option<OwningContext>> = HashMap::new();
        for record in &records {
            let context = record.context_ref();
            let owning = match targets.get(&context) {
                Some(owning) => owning.clone(),
                None => {
                    let owning = match context {
                        Some(context) => self.contexts.resolve_owning_context(context).await?,
                        None => None,
                    };
                    targets.insert(context, owning.clone());
                    owning
                }
            };
            let target = match owning {
                Some(ref owning) => AccessTarget::from(owning),
                None => AccessTarget::orphaned(record),
            };
            self.authorize(principal, &target, &format!("file {}", record.id))?;
        }

        self.delete_records(records).await
    }

    /// Delete every file stored under a portfolio entry.
    #[tracing::instrument(skip(self, principal), fields(principal.id = principal.id))]
    pub async fn purge_portfolio_files(
        &self,
        principal: &Principal,
        portfolio_item_id: PortfolioItemId,
    ) -> Result<BulkDeleteSummary, AppError> {
        let context = ContextRef::PortfolioEntry(portfolio_item_id);
        let owning = self.owning_context(context).await?;
        self.authorize(principal, &AccessTarget::from(&owning), &context)?;

        let records = self.files.find_by_context(context).await?;
        self.delete_records(records).await
    }

    async fn delete_records(
        &self,
        records: Vec<FileRecord>,
    ) -> Result<BulkDeleteSummary, AppError> {
        if records.is_empty() {
            return Ok(BulkDeleteSummary::default());
        }

        let report = self
            .storage
            .delete_many(
                records
                    .into_iter()
                    .map(|record| (record.id, record.file_url))
                    .collect(),
            )
            .await;

        let records_removed = self.files.remove_many(&report.deleted).await?;

        if !report.is_complete() {
            let kept: usize = report.failures.iter().map(|f| f.members.len()).sum();
            tracing::warn!(
                deleted = report.deleted.len(),
                kept,
                "Bulk delete incomplete, records of failed buckets kept"
            );
            return Err(AppError::Storage(format!(
                "Bulk delete failed for bucket(s) {}; {} file(s) kept",
                report.failed_buckets().join(", "),
                kept
            )));
        }

        tracing::info!(
            deleted = report.deleted.len(),
            records_removed,
            "Bulk delete complete"
        );
        Ok(BulkDeleteSummary {
            deleted: report.deleted,
            records_removed,
        })
    }

    /// Remove an object written for a record that was never persisted. Keys
    /// are deterministic, so a re-upload overwrites the object of an earlier
    /// record with the same filename; that object is kept.
    async fn discard_unreferenced(&self, context: ContextRef, stored: &StoredObject) {
        match self.files.find_by_context(context).await {
            Ok(records) if records.iter().any(|r| r.file_url == stored.reference) => {
                tracing::warn!(
                    bucket = %stored.address.bucket,
                    key = %stored.address.key,
                    "Stored object belongs to an earlier record, keeping it"
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %stored.address.bucket,
                    key = %stored.address.key,
                    "Cannot check for earlier records, keeping stored object"
                );
                return;
            }
        }

        if let Err(cleanup) = self.storage.delete(&stored.reference).await {
            tracing::warn!(
                error = %cleanup,
                bucket = %stored.address.bucket,
                key = %stored.address.key,
                "Stored object left without a record"
            );
        }
    }

    async fn owning_context(&self, context: ContextRef) -> Result<OwningContext, AppError> {
        self.contexts
            .resolve_owning_context(context)
            .await?
            .ok_or_else(|| AppError::NotFound(context.to_string()))
    }

    async fn authorized_record(
        &self,
        principal: &Principal,
        file_id: FileId,
    ) -> Result<FileRecord, AppError> {
        let resource = format!("file {}", file_id);
        let record = self
            .files
            .find(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(resource.clone()))?;

        let owning = match record.context_ref() {
            Some(context) => self.contexts.resolve_owning_context(context).await?,
            None => None,
        };
        let target = match owning {
            Some(ref owning) => AccessTarget::from(owning),
            None => {
                tracing::debug!(file_id, "Owning context gone, checking against the record");
                AccessTarget::orphaned(&record)
            }
        };

        self.authorize(principal, &target, &resource)?;
        Ok(record)
    }

    fn authorize(
        &self,
        principal: &Principal,
        target: &AccessTarget,
        resource: &dyn std::fmt::Display,
    ) -> Result<AccessDecision, AppError> {
        let decision = self.gate.evaluate(principal, target);
        if decision.is_allowed() {
            return Ok(decision);
        }

        tracing::debug!(
            principal.id = principal.id,
            principal.role = %principal.role,
            organization_id = target.organization_id,
            decision = %decision,
            "Access denied"
        );
        Err(AppError::AccessDenied(resource.to_string()))
    }
}
