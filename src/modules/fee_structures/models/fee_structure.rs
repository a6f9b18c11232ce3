// Fee structure catalog model.
//
// A fee structure decomposes a program's grand total into named semesters,
// each carrying a fixed set of five fee types, plus an optional hostel fee.
// Structures are immutable once referenced by a student assignment; the
// assignment embeds a deep-copy snapshot so later catalog edits never
// retroactively change what a student owes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// The closed set of fee categories a semester is billed under.
///
/// Deliberately a fixed enumeration rather than an open map so that the
/// five-category invariant is compiler-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(30)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    AdmissionFee,
    ExamPermitRegFee,
    SpecialFee,
    TuitionFee,
    Others,
}

impl FeeType {
    /// All fee types in canonical billing order
    pub const ALL: [FeeType; 5] = [
        FeeType::AdmissionFee,
        FeeType::ExamPermitRegFee,
        FeeType::SpecialFee,
        FeeType::TuitionFee,
        FeeType::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::AdmissionFee => "admission_fee",
            FeeType::ExamPermitRegFee => "exam_permit_reg_fee",
            FeeType::SpecialFee => "special_fee",
            FeeType::TuitionFee => "tuition_fee",
            FeeType::Others => "others",
        }
    }

    /// Human-readable label used in payer-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            FeeType::AdmissionFee => "Admission Fee",
            FeeType::ExamPermitRegFee => "Exam/Permit Registration Fee",
            FeeType::SpecialFee => "Special Fee",
            FeeType::TuitionFee => "Tuition Fee",
            FeeType::Others => "Other Fees",
        }
    }
}

impl std::fmt::Display for FeeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FeeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admission_fee" => Ok(FeeType::AdmissionFee),
            "exam_permit_reg_fee" => Ok(FeeType::ExamPermitRegFee),
            "special_fee" => Ok(FeeType::SpecialFee),
            "tuition_fee" => Ok(FeeType::TuitionFee),
            "others" => Ok(FeeType::Others),
            _ => Err(format!("Invalid fee type: {}", s)),
        }
    }
}

/// Amounts for every fee type of one semester
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub admission_fee: Decimal,
    pub exam_permit_reg_fee: Decimal,
    pub special_fee: Decimal,
    pub tuition_fee: Decimal,
    pub others: Decimal,
}

impl FeeBreakdown {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn amount(&self, fee_type: FeeType) -> Decimal {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee,
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee,
            FeeType::SpecialFee => self.special_fee,
            FeeType::TuitionFee => self.tuition_fee,
            FeeType::Others => self.others,
        }
    }

    pub fn set_amount(&mut self, fee_type: FeeType, amount: Decimal) {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee = amount,
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee = amount,
            FeeType::SpecialFee => self.special_fee = amount,
            FeeType::TuitionFee => self.tuition_fee = amount,
            FeeType::Others => self.others = amount,
        }
    }

    /// All entries in canonical order
    pub fn entries(&self) -> [(FeeType, Decimal); 5] {
        [
            (FeeType::AdmissionFee, self.admission_fee),
            (FeeType::ExamPermitRegFee, self.exam_permit_reg_fee),
            (FeeType::SpecialFee, self.special_fee),
            (FeeType::TuitionFee, self.tuition_fee),
            (FeeType::Others, self.others),
        ]
    }

    pub fn total(&self) -> Decimal {
        self.entries().iter().map(|(_, amount)| *amount).sum()
    }

    /// Every amount must be a non-negative whole-rupee figure
    pub fn validate(&self) -> Result<()> {
        for (fee_type, amount) in self.entries() {
            Currency::INR
                .validate_amount(amount)
                .map_err(|e| AppError::validation(format!("{}: {}", fee_type.label(), e)))?;
        }
        Ok(())
    }
}

/// Partial breakdown carrying only the fee types a customization overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_permit_reg_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuition_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub others: Option<Decimal>,
}

impl FeeOverride {
    pub fn amount(&self, fee_type: FeeType) -> Option<Decimal> {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee,
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee,
            FeeType::SpecialFee => self.special_fee,
            FeeType::TuitionFee => self.tuition_fee,
            FeeType::Others => self.others,
        }
    }

    pub fn set_amount(&mut self, fee_type: FeeType, amount: Decimal) {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee = Some(amount),
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee = Some(amount),
            FeeType::SpecialFee => self.special_fee = Some(amount),
            FeeType::TuitionFee => self.tuition_fee = Some(amount),
            FeeType::Others => self.others = Some(amount),
        }
    }

    /// Overridden entries only, in canonical order
    pub fn entries(&self) -> Vec<(FeeType, Decimal)> {
        FeeType::ALL
            .iter()
            .filter_map(|ft| self.amount(*ft).map(|amount| (*ft, amount)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (fee_type, amount) in self.entries() {
            Currency::INR
                .validate_amount(amount)
                .map_err(|e| AppError::validation(format!("{}: {}", fee_type.label(), e)))?;
        }
        Ok(())
    }
}

/// One semester of a fee structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSemester {
    /// 1-based semester number
    pub semester: u32,
    pub semester_name: String,
    pub fees: FeeBreakdown,
    /// Stored redundantly; must equal `fees.total()`
    pub total: Decimal,
}

impl FeeSemester {
    pub fn new(semester: u32, semester_name: String, fees: FeeBreakdown) -> Result<Self> {
        if semester == 0 {
            return Err(AppError::validation("Semester number must be positive"));
        }
        if semester_name.trim().is_empty() {
            return Err(AppError::validation("Semester name cannot be empty"));
        }
        fees.validate()?;

        let total = fees.total();
        Ok(Self {
            semester,
            semester_name,
            fees,
            total,
        })
    }

    /// A semester whose stored total disagrees with its breakdown is
    /// corrupt financial data; computation must halt rather than pick one.
    pub fn validate_integrity(&self) -> Result<()> {
        if self.total != self.fees.total() {
            return Err(AppError::data_integrity(format!(
                "Semester {} total {} disagrees with its fee breakdown sum {}",
                self.semester,
                self.total,
                self.fees.total()
            )));
        }
        Ok(())
    }
}

/// Versioned catalog entry: the fee schedule for one program and academic year
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeStructure {
    /// Unique structure ID (UUID)
    #[serde(skip_deserializing)]
    pub id: Option<String>,

    pub program: String,

    pub academic_year: String,

    #[sqlx(json)]
    pub semesters: Vec<FeeSemester>,

    /// Sum of all semester totals (hostel fee excluded)
    pub grand_total: Decimal,

    /// Optional hostel fee, billed separately from semester dues
    pub hostel_fee: Decimal,

    #[serde(skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeeStructure {
    pub fn new(
        program: String,
        academic_year: String,
        semesters: Vec<FeeSemester>,
        hostel_fee: Decimal,
    ) -> Result<Self> {
        if program.trim().is_empty() {
            return Err(AppError::validation("Program cannot be empty"));
        }
        if academic_year.trim().is_empty() {
            return Err(AppError::validation("Academic year cannot be empty"));
        }
        if semesters.is_empty() {
            return Err(AppError::validation(
                "Fee structure must have at least one semester",
            ));
        }
        Currency::INR
            .validate_amount(hostel_fee)
            .map_err(|e| AppError::validation(format!("Hostel fee: {}", e)))?;

        let mut seen = std::collections::HashSet::new();
        for sem in &semesters {
            sem.validate_integrity()?;
            if !seen.insert(sem.semester) {
                return Err(AppError::validation(format!(
                    "Duplicate semester number {}",
                    sem.semester
                )));
            }
        }

        let grand_total = semesters.iter().map(|s| s.total).sum();
        let now = Utc::now();

        Ok(Self {
            id: Some(Uuid::new_v4().to_string()),
            program,
            academic_year,
            semesters,
            grand_total,
            hostel_fee,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    pub fn semester(&self, number: u32) -> Option<&FeeSemester> {
        self.semesters.iter().find(|s| s.semester == number)
    }

    /// Integrity check for rows loaded from persistence
    pub fn validate_integrity(&self) -> Result<()> {
        for sem in &self.semesters {
            sem.validate_integrity()?;
        }
        let expected: Decimal = self.semesters.iter().map(|s| s.total).sum();
        if self.grand_total != expected {
            return Err(AppError::data_integrity(format!(
                "Grand total {} disagrees with semester totals sum {}",
                self.grand_total, expected
            )));
        }
        Ok(())
    }
}
