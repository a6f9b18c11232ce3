use std::sync::Arc;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::assignments::models::{FeeAssignment, FeeCustomization, StaffActor};
use crate::modules::assignments::repositories::AssignmentRepository;
use crate::modules::fee_structures::repositories::FeeStructureRepository;

/// Assignment service.
///
/// Assigning a structure embeds a deep-copy snapshot; customizations are
/// appended to the event log and never merged or rewritten.
pub struct AssignmentService {
    assignment_repo: Arc<dyn AssignmentRepository>,
    structure_repo: Arc<dyn FeeStructureRepository>,
}

impl AssignmentService {
    pub fn new(
        assignment_repo: Arc<dyn AssignmentRepository>,
        structure_repo: Arc<dyn FeeStructureRepository>,
    ) -> Self {
        Self {
            assignment_repo,
            structure_repo,
        }
    }

    /// Assign a fee structure to a student, snapshotting it as of now.
    /// A student can hold only one active assignment at a time.
    pub async fn assign_structure(
        &self,
        student_id: &str,
        structure_id: &str,
        assigned_by: StaffActor,
    ) -> Result<FeeAssignment> {
        let structure = self
            .structure_repo
            .find_by_id(structure_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee structure '{}'", structure_id)))?;

        if let Some(existing) = self
            .assignment_repo
            .find_active_by_student(student_id)
            .await?
        {
            return Err(AppError::validation(format!(
                "Student '{}' already has an active fee assignment ({}); deactivate it first",
                student_id,
                existing.id.as_deref().unwrap_or("unknown")
            )));
        }

        let assignment = FeeAssignment::new(student_id.to_string(), &structure, assigned_by)?;
        let created = self.assignment_repo.create(&assignment).await?;

        info!(
            assignment_id = ?created.id,
            student_id = %student_id,
            structure_id = %structure_id,
            "Fee structure assigned"
        );
        Ok(created)
    }

    pub async fn get_assignment(&self, id: &str) -> Result<FeeAssignment> {
        self.assignment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee assignment '{}'", id)))
    }

    pub async fn active_assignment_for(&self, student_id: &str) -> Result<Option<FeeAssignment>> {
        self.assignment_repo.find_active_by_student(student_id).await
    }

    /// Append a customization to an assignment's event log
    pub async fn add_customization(
        &self,
        assignment_id: &str,
        customization: FeeCustomization,
    ) -> Result<FeeAssignment> {
        let mut assignment = self.get_assignment(assignment_id).await?;
        if !assignment.is_active {
            return Err(AppError::validation(format!(
                "Fee assignment '{}' is no longer active",
                assignment_id
            )));
        }

        // Model-level validation: semester must exist, amounts non-negative
        assignment.add_customization(customization.clone())?;
        self.assignment_repo
            .append_customization(assignment_id, &customization)
            .await?;

        info!(
            assignment_id = %assignment_id,
            semester = customization.semester,
            customized_by = %customization.customized_by.email,
            reason = ?customization.reason,
            "Fee customization appended"
        );
        Ok(assignment)
    }

    pub async fn deactivate(&self, assignment_id: &str) -> Result<()> {
        self.assignment_repo.deactivate(assignment_id).await?;
        info!(assignment_id = %assignment_id, "Fee assignment deactivated");
        Ok(())
    }
}
