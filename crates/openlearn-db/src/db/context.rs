//! Owning-context lookups over the course tables.
//!
//! Expected shape (owned by the wider platform):
//! `app_user(id, organization_id)`, `course(id, organization_id, instructor_id)`,
//! `assignment(id, course_id)`, `portfolio_item(id, student_id)` and
//! `student_course(student_id, course_id)`.

use async_trait::async_trait;
use openlearn_core::models::{
    AssignmentId, ContextRef, CourseId, OrganizationId, OwningContext, PortfolioItemId, UserId,
};
use openlearn_core::AppError;
use sqlx::{PgPool, Postgres};

/// Resolves a requested context into the owning context authorization needs.
#[async_trait]
pub trait ContextDirectory: Send + Sync {
    /// `Ok(None)` when the assignment or portfolio item does not exist.
    async fn resolve_owning_context(
        &self,
        context: ContextRef,
    ) -> Result<Option<OwningContext>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct AssignmentOwnerRow {
    assignment_id: AssignmentId,
    course_id: CourseId,
    organization_id: OrganizationId,
    instructor_id: UserId,
}

#[derive(Debug, sqlx::FromRow)]
struct PortfolioOwnerRow {
    portfolio_item_id: PortfolioItemId,
    organization_id: OrganizationId,
    student_id: UserId,
}

#[derive(Clone)]
pub struct PgContextDirectory {
    pool: PgPool,
}

impl PgContextDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "assignment"))]
    async fn graded_work(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Option<OwningContext>, AppError> {
        let row: Option<AssignmentOwnerRow> = sqlx::query_as::<Postgres, AssignmentOwnerRow>(
            r#"
            SELECT a.id AS assignment_id, c.id AS course_id,
                   c.organization_id, c.instructor_id
            FROM assignment a
            JOIN course c ON c.id = a.course_id
            WHERE a.id = $1
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| OwningContext::GradedWork {
            assignment_id: r.assignment_id,
            course_id: r.course_id,
            organization_id: r.organization_id,
            instructor_id: r.instructor_id,
        }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "portfolio_item"))]
    async fn portfolio_entry(
        &self,
        portfolio_item_id: PortfolioItemId,
    ) -> Result<Option<OwningContext>, AppError> {
        let row: Option<PortfolioOwnerRow> = sqlx::query_as::<Postgres, PortfolioOwnerRow>(
            r#"
            SELECT p.id AS portfolio_item_id, u.organization_id, p.student_id
            FROM portfolio_item p
            JOIN app_user u ON u.id = p.student_id
            WHERE p.id = $1
            "#,
        )
        .bind(portfolio_item_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let supervising_instructors: Vec<UserId> = sqlx::query_scalar::<Postgres, UserId>(
            r#"
            SELECT DISTINCT c.instructor_id
            FROM student_course sc
            JOIN course c ON c.id = sc.course_id
            WHERE sc.student_id = $1 AND c.organization_id = $2
            ORDER BY c.instructor_id
            "#,
        )
        .bind(row.student_id)
        .bind(row.organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OwningContext::PortfolioEntry {
            portfolio_item_id: row.portfolio_item_id,
            organization_id: row.organization_id,
            student_id: row.student_id,
            supervising_instructors,
        }))
    }
}

#[async_trait]
impl ContextDirectory for PgContextDirectory {
    async fn resolve_owning_context(
        &self,
        context: ContextRef,
    ) -> Result<Option<OwningContext>, AppError> {
        match context {
            ContextRef::GradedWork(assignment_id) => self.graded_work(assignment_id).await,
            ContextRef::PortfolioEntry(portfolio_item_id) => {
                self.portfolio_entry(portfolio_item_id).await
            }
        }
    }
}
