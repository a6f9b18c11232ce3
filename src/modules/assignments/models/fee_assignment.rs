// Fee assignment model.
//
// An assignment binds one student to a point-in-time snapshot of a fee
// structure. The snapshot is a deep copy taken at assignment time, so
// catalog edits never alter an active assignment. Customizations form an
// append-only event log; precedence is recomputed on every read (last one
// wins per fee type) rather than collapsed into a mutable override.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::fee_structures::models::{FeeOverride, FeeSemester, FeeStructure};

/// Authenticated staff member, supplied by the surrounding application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffActor {
    pub name: String,
    pub email: String,
}

impl StaffActor {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Immutable copy of a fee structure, embedded at assignment time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStructureSnapshot {
    pub academic_year: String,
    pub semesters: Vec<FeeSemester>,
    pub grand_total: Decimal,
    pub hostel_fee: Decimal,
}

impl FeeStructureSnapshot {
    pub fn from_structure(structure: &FeeStructure) -> Self {
        Self {
            academic_year: structure.academic_year.clone(),
            semesters: structure.semesters.clone(),
            grand_total: structure.grand_total,
            hostel_fee: structure.hostel_fee,
        }
    }

    pub fn semester(&self, number: u32) -> Option<&FeeSemester> {
        self.semesters.iter().find(|s| s.semester == number)
    }
}

/// Staff-authored override of specific fee-type amounts for one semester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FeeCustomization {
    pub semester: u32,

    /// Only the overridden fee types are present
    #[sqlx(json)]
    pub fees: FeeOverride,

    pub reason: Option<String>,

    #[sqlx(json)]
    pub customized_by: StaffActor,

    pub customized_at: DateTime<Utc>,
}

impl FeeCustomization {
    pub fn new(
        semester: u32,
        fees: FeeOverride,
        reason: Option<String>,
        customized_by: StaffActor,
    ) -> Result<Self> {
        if semester == 0 {
            return Err(AppError::validation("Semester number must be positive"));
        }
        if fees.is_empty() {
            return Err(AppError::validation(
                "Customization must override at least one fee type",
            ));
        }
        fees.validate()?;

        Ok(Self {
            semester,
            fees,
            reason,
            customized_by,
            customized_at: Utc::now(),
        })
    }
}

/// Binds a student to a fee-structure snapshot plus customizations
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeAssignment {
    /// Unique assignment ID (UUID)
    #[serde(skip_deserializing)]
    pub id: Option<String>,

    pub student_id: String,

    /// Provenance only; the snapshot below is authoritative
    pub structure_id: String,

    #[sqlx(json)]
    pub snapshot: FeeStructureSnapshot,

    /// Append-only, chronologically ordered
    #[sqlx(skip)]
    #[serde(default)]
    pub customizations: Vec<FeeCustomization>,

    pub is_active: bool,

    #[sqlx(json)]
    pub assigned_by: StaffActor,

    #[serde(skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeeAssignment {
    /// Create an assignment, snapshotting the structure as it stands now
    pub fn new(student_id: String, structure: &FeeStructure, assigned_by: StaffActor) -> Result<Self> {
        if student_id.trim().is_empty() {
            return Err(AppError::validation("Student ID cannot be empty"));
        }
        let structure_id = structure
            .id
            .clone()
            .ok_or_else(|| AppError::validation("Fee structure has no ID"))?;
        structure.validate_integrity()?;

        let now = Utc::now();
        Ok(Self {
            id: Some(Uuid::new_v4().to_string()),
            student_id,
            structure_id,
            snapshot: FeeStructureSnapshot::from_structure(structure),
            customizations: Vec::new(),
            is_active: true,
            assigned_by,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Append a customization. The target semester must exist in the
    /// snapshot; the list is never reordered or merged.
    pub fn add_customization(&mut self, customization: FeeCustomization) -> Result<()> {
        if self.snapshot.semester(customization.semester).is_none() {
            return Err(AppError::validation(format!(
                "Semester {} is not part of this fee assignment",
                customization.semester
            )));
        }
        self.customizations.push(customization);
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Assignments are deactivated, never deleted
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Some(Utc::now());
    }

    /// Customizations for one semester in ascending `customized_at` order
    pub fn customizations_for(&self, semester: u32) -> Vec<&FeeCustomization> {
        let mut matching: Vec<&FeeCustomization> = self
            .customizations
            .iter()
            .filter(|c| c.semester == semester)
            .collect();
        matching.sort_by_key(|c| c.customized_at);
        matching
    }
}
