use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::assignments::models::{FeeAssignment, FeeCustomization};

/// Persistence contract for fee assignments.
///
/// Assignments are created once, extended by appending customizations,
/// and deactivated; they are never deleted.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &FeeAssignment) -> Result<FeeAssignment>;

    /// Loads the assignment with its customizations in insertion order
    async fn find_by_id(&self, id: &str) -> Result<Option<FeeAssignment>>;

    async fn find_active_by_student(&self, student_id: &str) -> Result<Option<FeeAssignment>>;

    async fn append_customization(
        &self,
        assignment_id: &str,
        customization: &FeeCustomization,
    ) -> Result<()>;

    async fn deactivate(&self, assignment_id: &str) -> Result<()>;

    /// Whether any assignment references the given catalog structure
    async fn exists_for_structure(&self, structure_id: &str) -> Result<bool>;
}

/// MySQL-backed assignment store. Customizations live in their own
/// append-only table keyed by assignment id.
pub struct MySqlAssignmentRepository {
    pool: MySqlPool,
}

impl MySqlAssignmentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn load_customizations(&self, assignment_id: &str) -> Result<Vec<FeeCustomization>> {
        let customizations = sqlx::query_as::<_, FeeCustomization>(
            r#"
            SELECT semester, fees, reason, customized_by, customized_at
            FROM fee_customizations
            WHERE assignment_id = ?
            ORDER BY customized_at ASC, id ASC
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(customizations)
    }
}

#[async_trait]
impl AssignmentRepository for MySqlAssignmentRepository {
    async fn create(&self, assignment: &FeeAssignment) -> Result<FeeAssignment> {
        let id = assignment
            .id
            .as_ref()
            .ok_or_else(|| AppError::internal("Assignment ID is required for creation"))?;

        sqlx::query(
            r#"
            INSERT INTO fee_assignments (
                id, student_id, structure_id, snapshot, is_active, assigned_by
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&assignment.student_id)
        .bind(&assignment.structure_id)
        .bind(serde_json::to_value(&assignment.snapshot)?)
        .bind(assignment.is_active)
        .bind(serde_json::to_value(&assignment.assigned_by)?)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal("Assignment was created but not found"))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FeeAssignment>> {
        let assignment = sqlx::query_as::<_, FeeAssignment>(
            r#"
            SELECT id, student_id, structure_id, snapshot, is_active,
                   assigned_by, created_at, updated_at
            FROM fee_assignments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match assignment {
            Some(mut assignment) => {
                assignment.customizations = self.load_customizations(id).await?;
                Ok(Some(assignment))
            }
            None => Ok(None),
        }
    }

    async fn find_active_by_student(&self, student_id: &str) -> Result<Option<FeeAssignment>> {
        let assignment = sqlx::query_as::<_, FeeAssignment>(
            r#"
            SELECT id, student_id, structure_id, snapshot, is_active,
                   assigned_by, created_at, updated_at
            FROM fee_assignments
            WHERE student_id = ? AND is_active = TRUE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        match assignment {
            Some(mut assignment) => {
                let id = assignment
                    .id
                    .clone()
                    .ok_or_else(|| AppError::internal("Assignment row has no ID"))?;
                assignment.customizations = self.load_customizations(&id).await?;
                Ok(Some(assignment))
            }
            None => Ok(None),
        }
    }

    async fn append_customization(
        &self,
        assignment_id: &str,
        customization: &FeeCustomization,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fee_customizations (
                assignment_id, semester, fees, reason, customized_by, customized_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment_id)
        .bind(customization.semester)
        .bind(serde_json::to_value(&customization.fees)?)
        .bind(&customization.reason)
        .bind(serde_json::to_value(&customization.customized_by)?)
        .bind(customization.customized_at)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE fee_assignments SET updated_at = NOW() WHERE id = ?")
            .bind(assignment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn deactivate(&self, assignment_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE fee_assignments SET is_active = FALSE, updated_at = NOW() WHERE id = ?",
        )
        .bind(assignment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Assignment '{}'", assignment_id)));
        }
        Ok(())
    }

    async fn exists_for_structure(&self, structure_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fee_assignments WHERE structure_id = ?",
        )
        .bind(structure_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
