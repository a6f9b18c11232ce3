use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::fee_structures::models::FeeStructure;

/// Persistence contract for the fee structure catalog
#[async_trait]
pub trait FeeStructureRepository: Send + Sync {
    async fn create(&self, structure: &FeeStructure) -> Result<FeeStructure>;

    async fn find_by_id(&self, id: &str) -> Result<Option<FeeStructure>>;

    async fn find_by_program_year(
        &self,
        program: &str,
        academic_year: &str,
    ) -> Result<Option<FeeStructure>>;

    async fn list(&self) -> Result<Vec<FeeStructure>>;

    /// Replaces a catalog entry. The service layer refuses this once any
    /// assignment references the structure.
    async fn update(&self, structure: &FeeStructure) -> Result<FeeStructure>;
}

/// MySQL-backed catalog store
pub struct MySqlFeeStructureRepository {
    pool: MySqlPool,
}

impl MySqlFeeStructureRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl FeeStructureRepository for MySqlFeeStructureRepository {
    async fn create(&self, structure: &FeeStructure) -> Result<FeeStructure> {
        let id = structure
            .id
            .as_ref()
            .ok_or_else(|| AppError::internal("Fee structure ID is required for creation"))?;

        sqlx::query(
            r#"
            INSERT INTO fee_structures (
                id, program, academic_year, semesters, grand_total, hostel_fee
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&structure.program)
        .bind(&structure.academic_year)
        .bind(serde_json::to_value(&structure.semesters)?)
        .bind(structure.grand_total)
        .bind(structure.hostel_fee)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal("Fee structure was created but not found"))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FeeStructure>> {
        let structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT id, program, academic_year, semesters, grand_total, hostel_fee,
                   created_at, updated_at
            FROM fee_structures
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(structure)
    }

    async fn find_by_program_year(
        &self,
        program: &str,
        academic_year: &str,
    ) -> Result<Option<FeeStructure>> {
        let structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT id, program, academic_year, semesters, grand_total, hostel_fee,
                   created_at, updated_at
            FROM fee_structures
            WHERE program = ? AND academic_year = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(program)
        .bind(academic_year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(structure)
    }

    async fn list(&self) -> Result<Vec<FeeStructure>> {
        let structures = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT id, program, academic_year, semesters, grand_total, hostel_fee,
                   created_at, updated_at
            FROM fee_structures
            ORDER BY academic_year DESC, program ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(structures)
    }

    async fn update(&self, structure: &FeeStructure) -> Result<FeeStructure> {
        let id = structure
            .id
            .as_ref()
            .ok_or_else(|| AppError::internal("Fee structure ID is required for update"))?;

        let result = sqlx::query(
            r#"
            UPDATE fee_structures
            SET program = ?, academic_year = ?, semesters = ?,
                grand_total = ?, hostel_fee = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(&structure.program)
        .bind(&structure.academic_year)
        .bind(serde_json::to_value(&structure.semesters)?)
        .bind(structure.grand_total)
        .bind(structure.hostel_fee)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Fee structure '{}'", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal("Fee structure was updated but not found"))
    }
}
