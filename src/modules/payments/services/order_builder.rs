// Payment order builder.
//
// Pure pricing and validation: a payment intent plus the current
// reconciled status produce a quoted order, or a validation error. All
// amounts are remaining balances, never gross dues, so a partially-paid
// student is never re-charged what they already paid. The quoted figures
// are fixed here and carried unchanged onto the pending payment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result};
use crate::modules::assignments::models::FeeAssignment;
use crate::modules::fee_structures::models::FeeType;
use crate::modules::payments::models::{PaymentLineItem, PaymentSource, PaymentType};
use crate::modules::payments::services::reconciliation::{FeeStatus, StudentPaymentStatus};

/// Surcharge applied to gateway-routed payments, waived at the office
pub fn convenience_fee_rate() -> Decimal {
    // 3%
    Decimal::new(3, 2)
}

/// A student's payment request, as submitted by the surrounding application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_type: PaymentType,

    /// Required for semester and partial payments
    pub semester: Option<u32>,

    /// Required for partial payments; must not name fully-paid fee types
    pub selected_fee_types: Option<Vec<FeeType>>,

    pub payment_source: PaymentSource,

    /// The total the payer approved, if the UI displayed one. A mismatch
    /// with the freshly computed total means the balance changed in
    /// between and the request must be retried after a re-fetch.
    pub expected_amount: Option<Decimal>,
}

/// Validated, priced order; figures are final
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderQuote {
    pub payment_type: PaymentType,
    pub semester: Option<u32>,
    pub line_items: Vec<PaymentLineItem>,
    pub amount: Decimal,
    pub convenience_fee: Decimal,
    pub total_amount: Decimal,
    pub payment_source: PaymentSource,
}

pub struct PaymentOrderBuilder;

impl PaymentOrderBuilder {
    /// Translate an intent into a priced order against the current status.
    ///
    /// The status must come from a successful reconciliation of the same
    /// assignment; there is deliberately no fallback that prices an order
    /// from gross effective fees when status data is missing.
    pub fn build(
        assignment: &FeeAssignment,
        status: &StudentPaymentStatus,
        intent: &PaymentIntent,
    ) -> Result<OrderQuote> {
        if !assignment.is_active {
            return Err(AppError::validation(
                "This fee assignment is no longer active",
            ));
        }

        let (semester, line_items, amount) = match intent.payment_type {
            PaymentType::FullPayment => {
                let items = Self::remaining_line_items(status, None);
                let amount = items.iter().map(|li| li.amount).sum();
                (None, items, amount)
            }
            PaymentType::SemesterPayment => {
                let semester = Self::required_semester(intent)?;
                let sem = Self::semester_status(status, semester)?;
                let items = Self::remaining_line_items(status, Some(semester));
                (Some(semester), items, sem.outstanding)
            }
            PaymentType::PartialPayment => {
                let semester = Self::required_semester(intent)?;
                let sem = Self::semester_status(status, semester)?;
                let selected = intent
                    .selected_fee_types
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AppError::validation(
                            "A partial payment must select at least one fee type",
                        )
                    })?;

                let mut seen = std::collections::HashSet::new();
                let mut items = Vec::with_capacity(selected.len());
                for fee_type in selected {
                    if !seen.insert(*fee_type) {
                        return Err(AppError::validation(format!(
                            "{} is selected more than once",
                            fee_type.label()
                        )));
                    }
                    let remaining = sem.remaining_balance.amount(*fee_type);
                    // A fully-paid selection is a hard failure: silently
                    // skipping it would open the door to double payment
                    if sem.fee_type_status.status(*fee_type) == FeeStatus::FullyPaid
                        || remaining == Decimal::ZERO
                    {
                        return Err(AppError::validation(format!(
                            "{} for semester {} has already been paid",
                            fee_type.label(),
                            semester
                        )));
                    }
                    items.push(PaymentLineItem {
                        semester,
                        fee_type: *fee_type,
                        amount: remaining,
                    });
                }
                let amount = items.iter().map(|li| li.amount).sum();
                (Some(semester), items, amount)
            }
            PaymentType::HostelFee => (None, Vec::new(), status.hostel.outstanding),
        };

        if amount <= Decimal::ZERO {
            return Err(AppError::validation(match intent.payment_type {
                PaymentType::HostelFee => "Nothing due: the hostel fee is already paid".to_string(),
                PaymentType::SemesterPayment => format!(
                    "Nothing due for semester {}",
                    semester.unwrap_or_default()
                ),
                _ => "Nothing due: all fees are already paid".to_string(),
            }));
        }

        let convenience_fee = match intent.payment_source {
            PaymentSource::OnlineGateway => Currency::INR.round(amount * convenience_fee_rate()),
            PaymentSource::ManualOffice => Decimal::ZERO,
        };
        let total_amount = amount + convenience_fee;

        if let Some(expected) = intent.expected_amount {
            if expected != total_amount {
                return Err(AppError::conflict(format!(
                    "The amount due changed from {} to {} while this payment was being prepared; refresh the fee summary and try again",
                    expected, total_amount
                )));
            }
        }

        Ok(OrderQuote {
            payment_type: intent.payment_type,
            semester,
            line_items,
            amount,
            convenience_fee,
            total_amount,
            payment_source: intent.payment_source,
        })
    }

    fn required_semester(intent: &PaymentIntent) -> Result<u32> {
        intent.semester.ok_or_else(|| {
            AppError::validation(format!("A semester is required for {}", intent.payment_type))
        })
    }

    fn semester_status<'a>(
        status: &'a StudentPaymentStatus,
        semester: u32,
    ) -> Result<&'a crate::modules::payments::services::reconciliation::SemesterPaymentStatus> {
        status.semester(semester).ok_or_else(|| {
            AppError::validation(format!(
                "Semester {} is not part of this fee assignment",
                semester
            ))
        })
    }

    /// Remaining-balance entries with value > 0, semester-tagged,
    /// optionally restricted to one semester
    fn remaining_line_items(
        status: &StudentPaymentStatus,
        semester: Option<u32>,
    ) -> Vec<PaymentLineItem> {
        status
            .semesters
            .iter()
            .filter(|s| semester.is_none_or(|n| s.semester == n))
            .flat_map(|s| {
                s.remaining_balance
                    .entries()
                    .into_iter()
                    .filter(|(_, amount)| *amount > Decimal::ZERO)
                    .map(|(fee_type, amount)| PaymentLineItem {
                        semester: s.semester,
                        fee_type,
                        amount,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
