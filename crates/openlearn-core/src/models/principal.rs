use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

pub type UserId = i64;
pub type OrganizationId = i64;

/// User role for authorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
    Administrator,
}

impl UserRole {
    /// Instructors act on graded work and supervised portfolios only.
    pub fn is_elevated(&self) -> bool {
        matches!(self, UserRole::Instructor)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Instructor => write!(f, "instructor"),
            UserRole::Administrator => write!(f, "administrator"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "administrator" | "admin" => Ok(UserRole::Administrator),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// The acting user of an operation. Always passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub role: UserRole,
}

impl Principal {
    pub fn new(id: UserId, organization_id: OrganizationId, role: UserRole) -> Self {
        Self {
            id,
            organization_id,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Administrator
    }
}
