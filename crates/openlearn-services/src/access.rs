//! Organization-scoped access policy for stored files.

use std::fmt::{Display, Formatter, Result as FmtResult};

use openlearn_core::models::{
    FileKind, FileRecord, OrganizationId, OwningContext, Principal, UserId, UserRole,
};

/// What an access check is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTarget {
    pub organization_id: OrganizationId,
    pub kind: FileKind,
    /// Instructors allowed to act on the target
    pub supervising_instructors: Vec<UserId>,
}

impl AccessTarget {
    /// Target for a file record whose owning context no longer resolves.
    /// Graded work stays with the instructor captured at write time; no
    /// instructor supervises an orphaned portfolio file.
    pub fn orphaned(record: &FileRecord) -> Self {
        let supervising_instructors = match record.kind {
            FileKind::GradedWork => vec![record.subject_user_id],
            FileKind::PortfolioEntry => Vec::new(),
        };

        Self {
            organization_id: record.organization_id,
            kind: record.kind,
            supervising_instructors,
        }
    }
}

impl From<&OwningContext> for AccessTarget {
    fn from(context: &OwningContext) -> Self {
        Self {
            organization_id: context.organization_id(),
            kind: context.kind(),
            supervising_instructors: context.supervising_instructors().to_vec(),
        }
    }
}

/// The rule that decided an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    AdminBypass,
    SameOrganization,
    SupervisingInstructor,
    DeniedForeignOrganization,
    DeniedNotSupervisingInstructor,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            AccessDecision::AdminBypass
                | AccessDecision::SameOrganization
                | AccessDecision::SupervisingInstructor
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::AdminBypass => "admin_bypass",
            AccessDecision::SameOrganization => "same_organization",
            AccessDecision::SupervisingInstructor => "supervising_instructor",
            AccessDecision::DeniedForeignOrganization => "denied_foreign_organization",
            AccessDecision::DeniedNotSupervisingInstructor => {
                "denied_not_supervising_instructor"
            }
        }
    }
}

impl Display for AccessDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Single access policy for every file operation.
///
/// 1. Administrators are always allowed.
/// 2. Instructors are allowed within their organization when they supervise
///    the target: the course instructor for graded work, an instructor of one
///    of the student's courses for a portfolio entry.
/// 3. Everyone else is allowed within their organization.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, principal: &Principal, target: &AccessTarget) -> AccessDecision {
        if principal.is_admin() {
            return AccessDecision::AdminBypass;
        }

        if principal.organization_id != target.organization_id {
            return AccessDecision::DeniedForeignOrganization;
        }

        match principal.role {
            UserRole::Instructor if target.supervising_instructors.contains(&principal.id) => {
                AccessDecision::SupervisingInstructor
            }
            UserRole::Instructor => AccessDecision::DeniedNotSupervisingInstructor,
            _ => AccessDecision::SameOrganization,
        }
    }

    pub fn allow(&self, principal: &Principal, target: &AccessTarget) -> bool {
        self.evaluate(principal, target).is_allowed()
    }
}
