use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::file::FileKind;
use super::principal::{OrganizationId, UserId};

pub type AssignmentId = i64;
pub type CourseId = i64;
pub type PortfolioItemId = i64;

/// Reference to the context an upload targets, as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ContextRef {
    GradedWork(AssignmentId),
    PortfolioEntry(PortfolioItemId),
}

impl ContextRef {
    pub fn kind(&self) -> FileKind {
        match self {
            ContextRef::GradedWork(_) => FileKind::GradedWork,
            ContextRef::PortfolioEntry(_) => FileKind::PortfolioEntry,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ContextRef::GradedWork(id) | ContextRef::PortfolioEntry(id) => *id,
        }
    }
}

impl Display for ContextRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ContextRef::GradedWork(id) => write!(f, "assignment {}", id),
            ContextRef::PortfolioEntry(id) => write!(f, "portfolio item {}", id),
        }
    }
}

/// A resolved owning context with the attributes authorization needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OwningContext {
    /// An assignment of a course; the course instructor owns it.
    GradedWork {
        assignment_id: AssignmentId,
        course_id: CourseId,
        organization_id: OrganizationId,
        instructor_id: UserId,
    },
    /// A student's portfolio entry. `supervising_instructors` are the
    /// instructors of the courses the student is enrolled in.
    PortfolioEntry {
        portfolio_item_id: PortfolioItemId,
        organization_id: OrganizationId,
        student_id: UserId,
        supervising_instructors: Vec<UserId>,
    },
}

impl OwningContext {
    pub fn context_ref(&self) -> ContextRef {
        match self {
            OwningContext::GradedWork { assignment_id, .. } => {
                ContextRef::GradedWork(*assignment_id)
            }
            OwningContext::PortfolioEntry {
                portfolio_item_id, ..
            } => ContextRef::PortfolioEntry(*portfolio_item_id),
        }
    }

    pub fn kind(&self) -> FileKind {
        self.context_ref().kind()
    }

    pub fn organization_id(&self) -> OrganizationId {
        match self {
            OwningContext::GradedWork {
                organization_id, ..
            }
            | OwningContext::PortfolioEntry {
                organization_id, ..
            } => *organization_id,
        }
    }

    /// The user a file stored under this context is for: the course
    /// instructor for graded work, the student for a portfolio entry.
    pub fn subject_user_id(&self) -> UserId {
        match self {
            OwningContext::GradedWork { instructor_id, .. } => *instructor_id,
            OwningContext::PortfolioEntry { student_id, .. } => *student_id,
        }
    }

    pub fn supervising_instructors(&self) -> &[UserId] {
        match self {
            OwningContext::GradedWork { instructor_id, .. } => std::slice::from_ref(instructor_id),
            OwningContext::PortfolioEntry {
                supervising_instructors,
                ..
            } => supervising_instructors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graded_work_is_supervised_by_its_instructor_only() {
        let context = OwningContext::GradedWork {
            assignment_id: 42,
            course_id: 3,
            organization_id: 1,
            instructor_id: 9,
        };
        assert_eq!(context.supervising_instructors(), &[9]);
        assert_eq!(context.subject_user_id(), 9);
        assert_eq!(context.context_ref(), ContextRef::GradedWork(42));
    }

    #[test]
    fn test_portfolio_subject_is_the_student() {
        let context = OwningContext::PortfolioEntry {
            portfolio_item_id: 7,
            organization_id: 1,
            student_id: 11,
            supervising_instructors: vec![9, 10],
        };
        assert_eq!(context.subject_user_id(), 11);
        assert_eq!(context.kind(), FileKind::PortfolioEntry);
        assert_eq!(context.context_ref().to_string(), "portfolio item 7");
    }

    #[test]
    fn test_context_ref_serializes_tagged() {
        let json = serde_json::to_value(ContextRef::GradedWork(5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "graded_work", "id": 5}));
    }
}
