use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::context::{AssignmentId, ContextRef, OwningContext, PortfolioItemId};
use super::principal::{OrganizationId, UserId};

pub type FileId = i64;

/// Classification of a stored file, persisted as `Assignment` / `Portfolio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "Assignment")]
    GradedWork,
    #[serde(rename = "Portfolio")]
    PortfolioEntry,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::GradedWork => "Assignment",
            FileKind::PortfolioEntry => "Portfolio",
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assignment" => Ok(FileKind::GradedWork),
            "Portfolio" => Ok(FileKind::PortfolioEntry),
            _ => Err(anyhow::anyhow!("Invalid file type: {}", s)),
        }
    }
}

/// A persisted file: where its bytes live and whom it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Stored reference to the object, normally `https://{host}/{bucket}/{key}`
    pub file_url: String,
    pub uploaded_by: UserId,
    /// Course instructor for graded work, student for portfolio entries
    pub subject_user_id: UserId,
    pub organization_id: OrganizationId,
    pub kind: FileKind,
    pub assignment_id: Option<AssignmentId>,
    pub portfolio_item_id: Option<PortfolioItemId>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// The context the file was stored under, if the record is well formed.
    pub fn context_ref(&self) -> Option<ContextRef> {
        match self.kind {
            FileKind::GradedWork => self.assignment_id.map(ContextRef::GradedWork),
            FileKind::PortfolioEntry => self.portfolio_item_id.map(ContextRef::PortfolioEntry),
        }
    }
}

/// A file record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub file_url: String,
    pub uploaded_by: UserId,
    pub subject_user_id: UserId,
    pub organization_id: OrganizationId,
    pub kind: FileKind,
    pub assignment_id: Option<AssignmentId>,
    pub portfolio_item_id: Option<PortfolioItemId>,
    pub created_at: DateTime<Utc>,
}

impl NewFileRecord {
    pub fn for_context(context: &OwningContext, uploaded_by: UserId, file_url: String) -> Self {
        let (assignment_id, portfolio_item_id) = match context.context_ref() {
            ContextRef::GradedWork(id) => (Some(id), None),
            ContextRef::PortfolioEntry(id) => (None, Some(id)),
        };

        Self {
            file_url,
            uploaded_by,
            subject_user_id: context.subject_user_id(),
            organization_id: context.organization_id(),
            kind: context.kind(),
            assignment_id,
            portfolio_item_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(self, id: FileId) -> FileRecord {
        FileRecord {
            id,
            file_url: self.file_url,
            uploaded_by: self.uploaded_by,
            subject_user_id: self.subject_user_id,
            organization_id: self.organization_id,
            kind: self.kind,
            assignment_id: self.assignment_id,
            portfolio_item_id: self.portfolio_item_id,
            created_at: self.created_at,
        }
    }
}
