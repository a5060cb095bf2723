//! File record repository: CRUD for the file_information table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlearn_core::models::{
    AssignmentId, ContextRef, FileId, FileKind, FileRecord, NewFileRecord, OrganizationId,
    PortfolioItemId, UserId,
};
use openlearn_core::AppError;
use sqlx::{PgPool, Postgres};

const FILE_COLUMNS: &str = "id, file_url, uploaded_by, subject_user_id, organization_id, \
     file_type, assignment_id, portfolio_item_id, created_at";

/// Persistence of file records.
///
/// Implementations must be safe for concurrent use by independent requests.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find(&self, id: FileId) -> Result<Option<FileRecord>, AppError>;

    /// Records for the given ids. Unknown ids are absent from the result.
    async fn find_many(&self, ids: &[FileId]) -> Result<Vec<FileRecord>, AppError>;

    async fn find_by_context(&self, context: ContextRef) -> Result<Vec<FileRecord>, AppError>;

    async fn persist(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    /// Remove one record. Returns whether a record was removed.
    async fn remove(&self, id: FileId) -> Result<bool, AppError>;

    /// Remove several records; returns how many were removed.
    async fn remove_many(&self, ids: &[FileId]) -> Result<u64, AppError>;
}

/// Row type for file_information table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileInformationRow {
    pub id: FileId,
    pub file_url: String,
    pub uploaded_by: UserId,
    pub subject_user_id: UserId,
    pub organization_id: OrganizationId,
    pub file_type: String,
    pub assignment_id: Option<AssignmentId>,
    pub portfolio_item_id: Option<PortfolioItemId>,
    pub created_at: DateTime<Utc>,
}

impl FileInformationRow {
    pub fn to_file_record(self) -> Result<FileRecord, AppError> {
        let kind: FileKind = self.file_type.parse().map_err(|e: anyhow::Error| {
            AppError::Internal(format!("file_information row {}: {}", self.id, e))
        })?;

        Ok(FileRecord {
            id: self.id,
            file_url: self.file_url,
            uploaded_by: self.uploaded_by,
            subject_user_id: self.subject_user_id,
            organization_id: self.organization_id,
            kind,
            assignment_id: self.assignment_id,
            portfolio_item_id: self.portfolio_item_id,
            created_at: self.created_at,
        })
    }
}

fn to_file_records(rows: Vec<FileInformationRow>) -> Result<Vec<FileRecord>, AppError> {
    rows.into_iter()
        .map(FileInformationRow::to_file_record)
        .collect()
}

/// PostgreSQL repository for file_information table.
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self), fields(db.table = "file_information", db.record_id = %id))]
    async fn find(&self, id: FileId) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileInformationRow> = sqlx::query_as::<Postgres, FileInformationRow>(
            &format!("SELECT {} FROM file_information WHERE id = $1", FILE_COLUMNS),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FileInformationRow::to_file_record).transpose()
    }

    #[tracing::instrument(
        skip(self, ids),
        fields(db.table = "file_information", count = ids.len())
    )]
    async fn find_many(&self, ids: &[FileId]) -> Result<Vec<FileRecord>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<FileInformationRow> = sqlx::query_as::<Postgres, FileInformationRow>(
            &format!(
                "SELECT {} FROM file_information WHERE id = ANY($1) ORDER BY id",
                FILE_COLUMNS
            ),
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        to_file_records(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_information"))]
    async fn find_by_context(&self, context: ContextRef) -> Result<Vec<FileRecord>, AppError> {
        let column = match context {
            ContextRef::GradedWork(_) => "assignment_id",
            ContextRef::PortfolioEntry(_) => "portfolio_item_id",
        };
        let rows: Vec<FileInformationRow> = sqlx::query_as::<Postgres, FileInformationRow>(
            &format!(
                "SELECT {} FROM file_information WHERE {} = $1 AND file_type = $2 ORDER BY id",
                FILE_COLUMNS, column
            ),
        )
        .bind(context.id())
        .bind(context.kind().as_str())
        .fetch_all(&self.pool)
        .await?;
        to_file_records(rows)
    }

    #[tracing::instrument(
        skip(self, record),
        fields(db.table = "file_information", kind = %record.kind)
    )]
    async fn persist(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let row: FileInformationRow = sqlx::query_as::<Postgres, FileInformationRow>(&format!(
            r#"
            INSERT INTO file_information
                (file_url, uploaded_by, subject_user_id, organization_id, file_type,
                 assignment_id, portfolio_item_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(&record.file_url)
        .bind(record.uploaded_by)
        .bind(record.subject_user_id)
        .bind(record.organization_id)
        .bind(record.kind.as_str())
        .bind(record.assignment_id)
        .bind(record.portfolio_item_id)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.to_file_record()
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_information", db.record_id = %id))]
    async fn remove(&self, id: FileId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM file_information WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(
        skip(self, ids),
        fields(db.table = "file_information", count = ids.len())
    )]
    async fn remove_many(&self, ids: &[FileId]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM file_information WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
