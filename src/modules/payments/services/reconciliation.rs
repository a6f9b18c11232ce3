// Reconciliation engine.
//
// Pure computation over an assignment and its payment ledger: no clock, no
// I/O, no internal state. Given the same inputs it always derives the same
// per-semester, per-fee-type paid amounts, remaining balances and statuses.
// Only completed payments count, net of refunds; the engine never reports
// a negative remaining balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};
use crate::modules::assignments::models::FeeAssignment;
use crate::modules::fee_structures::models::{FeeBreakdown, FeeType};
use crate::modules::payments::models::{Payment, PaymentType};

/// Three-state payment progress, ordered `unpaid < partially_paid < fully_paid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Unpaid,
    PartiallyPaid,
    FullyPaid,
}

impl std::fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeeStatus::Unpaid => "unpaid",
            FeeStatus::PartiallyPaid => "partially_paid",
            FeeStatus::FullyPaid => "fully_paid",
        };
        write!(f, "{}", s)
    }
}

/// Per-fee-type status for one semester, one field per fee type so the
/// closed set stays compiler-checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTypeStatuses {
    pub admission_fee: FeeStatus,
    pub exam_permit_reg_fee: FeeStatus,
    pub special_fee: FeeStatus,
    pub tuition_fee: FeeStatus,
    pub others: FeeStatus,
}

impl FeeTypeStatuses {
    fn all(status: FeeStatus) -> Self {
        Self {
            admission_fee: status,
            exam_permit_reg_fee: status,
            special_fee: status,
            tuition_fee: status,
            others: status,
        }
    }

    pub fn status(&self, fee_type: FeeType) -> FeeStatus {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee,
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee,
            FeeType::SpecialFee => self.special_fee,
            FeeType::TuitionFee => self.tuition_fee,
            FeeType::Others => self.others,
        }
    }

    fn set_status(&mut self, fee_type: FeeType, status: FeeStatus) {
        match fee_type {
            FeeType::AdmissionFee => self.admission_fee = status,
            FeeType::ExamPermitRegFee => self.exam_permit_reg_fee = status,
            FeeType::SpecialFee => self.special_fee = status,
            FeeType::TuitionFee => self.tuition_fee = status,
            FeeType::Others => self.others = status,
        }
    }
}

/// Derived payment state of one semester; never stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemesterPaymentStatus {
    pub semester: u32,
    pub semester_name: String,
    /// Paid per fee type, capped at the amount due so totals reconcile
    pub fee_type_paid: FeeBreakdown,
    pub fee_type_status: FeeTypeStatuses,
    pub remaining_balance: FeeBreakdown,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub semester_status: FeeStatus,
}

/// Hostel fee tracked as its own pseudo-semester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostelPaymentStatus {
    pub due: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub status: FeeStatus,
}

/// Derived payment state of a whole assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentPaymentStatus {
    pub academic_year: String,
    /// Ordered by semester number
    pub semesters: Vec<SemesterPaymentStatus>,
    pub hostel: HostelPaymentStatus,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub overall_status: FeeStatus,
}

impl StudentPaymentStatus {
    pub fn semester(&self, number: u32) -> Option<&SemesterPaymentStatus> {
        self.semesters.iter().find(|s| s.semester == number)
    }
}

pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Effective dues for one semester: the snapshot folded with that
    /// semester's customizations in ascending `customized_at` order. A
    /// later customization strictly replaces an earlier one for the fee
    /// types it lists; unmentioned types fall through.
    pub fn effective_fees(assignment: &FeeAssignment, semester: u32) -> Result<FeeBreakdown> {
        let snapshot_semester = assignment.snapshot.semester(semester).ok_or_else(|| {
            AppError::validation(format!(
                "Semester {} is not part of this fee assignment",
                semester
            ))
        })?;
        snapshot_semester.validate_integrity()?;

        let mut fees = snapshot_semester.fees.clone();
        for customization in assignment.customizations_for(semester) {
            for (fee_type, amount) in customization.fees.entries() {
                if amount < Decimal::ZERO {
                    // Financial data error: halt, never clip to zero
                    return Err(AppError::data_integrity(format!(
                        "Customization of {} sets {} to a negative amount {}",
                        customization.customized_at,
                        fee_type.label(),
                        amount
                    )));
                }
                fees.set_amount(fee_type, amount);
            }
        }
        Ok(fees)
    }

    /// Derive the full payment state for an assignment from its ledger.
    ///
    /// Completed payments count in full; a partial refund subtracts its
    /// refunded line items; a full refund contributes zero. Pending,
    /// processing and failed payments contribute nothing.
    pub fn compute_status(
        assignment: &FeeAssignment,
        payments: &[Payment],
    ) -> Result<StudentPaymentStatus> {
        // Entries for other assignments (e.g. a prior deactivated one for
        // the same student) must not leak into this computation
        let payments: Vec<&Payment> = match assignment.id.as_deref() {
            Some(id) => payments.iter().filter(|p| p.assignment_id == id).collect(),
            None => payments.iter().collect(),
        };

        let mut semesters = Vec::with_capacity(assignment.snapshot.semesters.len());

        for snapshot_semester in &assignment.snapshot.semesters {
            let number = snapshot_semester.semester;
            let due = Self::effective_fees(assignment, number)?;

            // Net paid per fee type across all qualifying payments
            let mut paid_raw = FeeBreakdown::zero();
            for payment in &payments {
                if payment.payment_type == PaymentType::HostelFee {
                    continue;
                }
                for item in payment.net_line_items() {
                    if item.semester == number {
                        let current = paid_raw.amount(item.fee_type);
                        paid_raw.set_amount(item.fee_type, current + item.amount);
                    }
                }
            }

            let mut fee_type_paid = FeeBreakdown::zero();
            let mut remaining_balance = FeeBreakdown::zero();
            let mut fee_type_status = FeeTypeStatuses::all(FeeStatus::Unpaid);
            for (fee_type, due_amount) in due.entries() {
                let raw = paid_raw.amount(fee_type);
                // Over-payment clamps to fully paid; remaining never negative
                let remaining = (due_amount - raw).max(Decimal::ZERO);
                let paid = raw.min(due_amount);
                fee_type_paid.set_amount(fee_type, paid);
                remaining_balance.set_amount(fee_type, remaining);
                fee_type_status.set_status(fee_type, Self::fee_status(paid, remaining));
            }

            let total_due = due.total();
            let total_paid = fee_type_paid.total();
            let outstanding = remaining_balance.total();

            semesters.push(SemesterPaymentStatus {
                semester: number,
                semester_name: snapshot_semester.semester_name.clone(),
                fee_type_paid,
                fee_type_status,
                remaining_balance,
                total_due,
                total_paid,
                outstanding,
                semester_status: Self::fee_status(total_paid, outstanding),
            });
        }
        semesters.sort_by_key(|s| s.semester);

        let hostel_due = assignment.snapshot.hostel_fee;
        let hostel_raw: Decimal = payments
            .iter()
            .filter(|p| p.payment_type == PaymentType::HostelFee)
            .map(|p| p.net_amount())
            .sum();
        let hostel_outstanding = (hostel_due - hostel_raw).max(Decimal::ZERO);
        let hostel_paid = hostel_raw.min(hostel_due);
        let hostel = HostelPaymentStatus {
            due: hostel_due,
            paid: hostel_paid,
            outstanding: hostel_outstanding,
            status: Self::fee_status(hostel_paid, hostel_outstanding),
        };

        let total_due: Decimal =
            semesters.iter().map(|s| s.total_due).sum::<Decimal>() + hostel.due;
        let total_paid: Decimal =
            semesters.iter().map(|s| s.total_paid).sum::<Decimal>() + hostel.paid;
        let outstanding: Decimal =
            semesters.iter().map(|s| s.outstanding).sum::<Decimal>() + hostel.outstanding;

        Ok(StudentPaymentStatus {
            academic_year: assignment.snapshot.academic_year.clone(),
            semesters,
            hostel,
            total_due,
            total_paid,
            outstanding,
            overall_status: Self::fee_status(total_paid, outstanding),
        })
    }

    /// Shared three-way rule. Nothing outstanding is fully paid, which
    /// also makes a zero-due semester fully paid by convention.
    fn fee_status(paid: Decimal, outstanding: Decimal) -> FeeStatus {
        if outstanding == Decimal::ZERO {
            FeeStatus::FullyPaid
        } else if paid > Decimal::ZERO {
            FeeStatus::PartiallyPaid
        } else {
            FeeStatus::Unpaid
        }
    }
}
