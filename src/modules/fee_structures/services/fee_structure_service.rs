use std::sync::Arc;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::assignments::repositories::AssignmentRepository;
use crate::modules::fee_structures::models::FeeStructure;
use crate::modules::fee_structures::repositories::FeeStructureRepository;

/// Catalog service for fee structures.
///
/// Enforces that a structure becomes immutable once any student
/// assignment references it; students are insulated by their snapshot,
/// but the catalog entry itself must stay auditable too.
pub struct FeeStructureService {
    structure_repo: Arc<dyn FeeStructureRepository>,
    assignment_repo: Arc<dyn AssignmentRepository>,
}

impl FeeStructureService {
    pub fn new(
        structure_repo: Arc<dyn FeeStructureRepository>,
        assignment_repo: Arc<dyn AssignmentRepository>,
    ) -> Self {
        Self {
            structure_repo,
            assignment_repo,
        }
    }

    pub async fn create_structure(&self, structure: FeeStructure) -> Result<FeeStructure> {
        structure.validate_integrity()?;

        if let Some(existing) = self
            .structure_repo
            .find_by_program_year(&structure.program, &structure.academic_year)
            .await?
        {
            return Err(AppError::validation(format!(
                "A fee structure for {} {} already exists ({})",
                structure.program,
                structure.academic_year,
                existing.id.as_deref().unwrap_or("unknown")
            )));
        }

        let created = self.structure_repo.create(&structure).await?;
        info!(
            structure_id = ?created.id,
            program = %created.program,
            academic_year = %created.academic_year,
            grand_total = %created.grand_total,
            "Fee structure created"
        );
        Ok(created)
    }

    pub async fn get_structure(&self, id: &str) -> Result<FeeStructure> {
        let structure = self
            .structure_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee structure '{}'", id)))?;
        structure.validate_integrity()?;
        Ok(structure)
    }

    pub async fn find_for_program(
        &self,
        program: &str,
        academic_year: &str,
    ) -> Result<Option<FeeStructure>> {
        self.structure_repo
            .find_by_program_year(program, academic_year)
            .await
    }

    pub async fn list_structures(&self) -> Result<Vec<FeeStructure>> {
        self.structure_repo.list().await
    }

    /// Catalog edits are allowed only while nothing references the entry
    pub async fn update_structure(&self, structure: FeeStructure) -> Result<FeeStructure> {
        let id = structure
            .id
            .as_deref()
            .ok_or_else(|| AppError::validation("Fee structure has no ID"))?;
        structure.validate_integrity()?;

        if self.assignment_repo.exists_for_structure(id).await? {
            return Err(AppError::validation(format!(
                "Fee structure '{}' is referenced by student assignments and can no longer be edited",
                id
            )));
        }

        self.structure_repo.update(&structure).await
    }
}
