// Payment ledger document.
//
// Payments are append-only: a record is created in `pending` when an order
// is requested and only ever advances through the status state machine.
// The charged figures are fixed at order-creation time and are never
// recomputed from a possibly-changed ledger state at verification time.
// Refunds are the single mechanism that can move a fee's status backward.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};
use crate::modules::assignments::models::StaffActor;
use crate::modules::fee_structures::models::FeeType;

/// What a payment covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Every outstanding balance across all semesters
    FullPayment,
    /// One semester's outstanding balance
    SemesterPayment,
    /// A chosen subset of one semester's fee types
    PartialPayment,
    /// The hostel fee, billed outside semester dues
    HostelFee,
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentType::FullPayment => "full_payment",
            PaymentType::SemesterPayment => "semester_payment",
            PaymentType::PartialPayment => "partial_payment",
            PaymentType::HostelFee => "hostel_fee",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full_payment" => Ok(PaymentType::FullPayment),
            "semester_payment" => Ok(PaymentType::SemesterPayment),
            "partial_payment" => Ok(PaymentType::PartialPayment),
            "hostel_fee" => Ok(PaymentType::HostelFee),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

/// Payment status state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartialRefund,
}

impl PaymentStatus {
    /// Legal transitions:
    /// `pending -> {processing, failed}`, `processing -> {completed, failed}`,
    /// `completed -> {refunded, partial_refund}`. Everything else is rejected;
    /// in particular a failed payment is never resurrected.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Refunded)
                | (Completed, PartialRefund)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Refunded | PaymentStatus::PartialRefund
        )
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartialRefund => "partial_refund",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "partial_refund" => Ok(PaymentStatus::PartialRefund),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    RazorpayOnline,
    CashOffice,
    BankTransfer,
    Dd,
    Cheque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    /// Routed through the gateway; carries the convenience surcharge
    OnlineGateway,
    /// Recorded at the office counter; no surcharge
    ManualOffice,
}

/// One semester-tagged fee-type amount within a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLineItem {
    pub semester: u32,
    pub fee_type: FeeType,
    pub amount: Decimal,
}

/// Adjustment attached to a completed payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub amount: Decimal,
    /// Which line items the refund covers; empty for hostel payments
    pub line_items: Vec<PaymentLineItem>,
    pub reason: Option<String>,
    pub refunded_by: StaffActor,
    pub refunded_at: DateTime<Utc>,
}

/// Payment ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    /// Unique payment ID (UUID)
    #[serde(skip_deserializing)]
    pub id: Option<String>,

    pub student_id: String,

    pub assignment_id: String,

    pub payment_type: PaymentType,

    /// Required for semester and partial payments
    pub semester: Option<u32>,

    /// The fee types actually being paid in this transaction,
    /// semester-tagged so cross-semester payments reconcile exactly
    #[sqlx(json)]
    pub line_items: Vec<PaymentLineItem>,

    /// Sum of line items before surcharge
    pub amount_paid: Decimal,

    pub convenience_fee: Decimal,

    pub total_amount_charged: Decimal,

    pub status: PaymentStatus,

    pub payment_method: PaymentMethod,

    pub payment_source: PaymentSource,

    pub gateway_order_id: Option<String>,

    /// Gateway's unique payment id; idempotency key for verification
    pub gateway_payment_id: Option<String>,

    #[sqlx(json(nullable))]
    pub refund: Option<RefundRecord>,

    /// Staff member who recorded an office payment
    #[sqlx(json(nullable))]
    pub recorded_by: Option<StaffActor>,

    pub payment_date: DateTime<Utc>,

    pub academic_year: String,

    #[serde(skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        student_id: String,
        assignment_id: String,
        academic_year: String,
        payment_type: PaymentType,
        semester: Option<u32>,
        line_items: Vec<PaymentLineItem>,
        amount_paid: Decimal,
        convenience_fee: Decimal,
        payment_method: PaymentMethod,
        payment_source: PaymentSource,
    ) -> Result<Self> {
        if student_id.trim().is_empty() {
            return Err(AppError::validation("Student ID cannot be empty"));
        }
        if assignment_id.trim().is_empty() {
            return Err(AppError::validation("Assignment ID cannot be empty"));
        }
        if amount_paid <= Decimal::ZERO {
            return Err(AppError::validation("Payment amount must be positive"));
        }
        Currency::INR
            .validate_amount(amount_paid)
            .map_err(AppError::Validation)?;
        Currency::INR
            .validate_amount(convenience_fee)
            .map_err(AppError::Validation)?;

        match payment_type {
            PaymentType::SemesterPayment | PaymentType::PartialPayment => {
                if semester.is_none() {
                    return Err(AppError::validation(format!(
                        "A semester is required for {}",
                        payment_type
                    )));
                }
            }
            PaymentType::FullPayment | PaymentType::HostelFee => {
                if semester.is_some() {
                    return Err(AppError::validation(format!(
                        "A semester must not be given for {}",
                        payment_type
                    )));
                }
            }
        }

        if payment_type == PaymentType::HostelFee {
            if !line_items.is_empty() {
                return Err(AppError::validation(
                    "Hostel fee payments carry no fee-type line items",
                ));
            }
        } else {
            if line_items.is_empty() {
                return Err(AppError::validation(
                    "Payment must cover at least one fee type",
                ));
            }
            let items_total: Decimal = line_items.iter().map(|li| li.amount).sum();
            if items_total != amount_paid {
                return Err(AppError::validation(format!(
                    "Line items sum {} does not match payment amount {}",
                    items_total, amount_paid
                )));
            }
            for item in &line_items {
                if item.amount <= Decimal::ZERO {
                    return Err(AppError::validation(format!(
                        "{} line item must be positive",
                        item.fee_type.label()
                    )));
                }
                if let Some(sem) = semester {
                    if item.semester != sem {
                        return Err(AppError::validation(format!(
                            "Line item semester {} does not match payment semester {}",
                            item.semester, sem
                        )));
                    }
                }
            }
        }

        match payment_source {
            PaymentSource::OnlineGateway => {
                if payment_method != PaymentMethod::RazorpayOnline {
                    return Err(AppError::validation(
                        "Online payments must use the gateway payment method",
                    ));
                }
            }
            PaymentSource::ManualOffice => {
                if payment_method == PaymentMethod::RazorpayOnline {
                    return Err(AppError::validation(
                        "Office payments cannot use the gateway payment method",
                    ));
                }
                if convenience_fee != Decimal::ZERO {
                    return Err(AppError::validation(
                        "Office payments carry no convenience fee",
                    ));
                }
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Some(Uuid::new_v4().to_string()),
            student_id,
            assignment_id,
            payment_type,
            semester,
            line_items,
            amount_paid,
            convenience_fee,
            total_amount_charged: amount_paid + convenience_fee,
            status: PaymentStatus::Pending,
            payment_method,
            payment_source,
            gateway_order_id: None,
            gateway_payment_id: None,
            refund: None,
            recorded_by: None,
            payment_date: now,
            academic_year,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    pub fn get_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Advance through the status state machine
    pub fn transition(&mut self, new_status: PaymentStatus) -> Result<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(AppError::validation(format!(
                "Invalid payment status transition from {} to {}",
                self.status, new_status
            )));
        }
        self.status = new_status;
        if new_status == PaymentStatus::Completed {
            self.payment_date = Utc::now();
        }
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Attach a refund. A refund covering the whole amount moves the payment
    /// to `refunded`; anything less moves it to `partial_refund`.
    pub fn apply_refund(&mut self, refund: RefundRecord) -> Result<()> {
        if refund.amount <= Decimal::ZERO {
            return Err(AppError::validation("Refund amount must be positive"));
        }
        if refund.amount > self.amount_paid {
            return Err(AppError::validation(format!(
                "Refund amount {} exceeds the amount paid {}",
                refund.amount, self.amount_paid
            )));
        }

        if self.payment_type == PaymentType::HostelFee {
            if !refund.line_items.is_empty() {
                return Err(AppError::validation(
                    "Hostel fee refunds carry no fee-type line items",
                ));
            }
        } else {
            let refund_total: Decimal = refund.line_items.iter().map(|li| li.amount).sum();
            if refund_total != refund.amount {
                return Err(AppError::validation(format!(
                    "Refund line items sum {} does not match refund amount {}",
                    refund_total, refund.amount
                )));
            }
            for item in &refund.line_items {
                let paid = self
                    .line_items
                    .iter()
                    .filter(|li| li.semester == item.semester && li.fee_type == item.fee_type)
                    .map(|li| li.amount)
                    .sum::<Decimal>();
                if item.amount > paid {
                    return Err(AppError::validation(format!(
                        "Refund of {} for {} (semester {}) exceeds the {} paid",
                        item.amount,
                        item.fee_type.label(),
                        item.semester,
                        paid
                    )));
                }
            }
        }

        let target = if refund.amount == self.amount_paid {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartialRefund
        };
        self.transition(target)?;
        self.refund = Some(refund);
        Ok(())
    }

    /// Line items that still count toward balances, net of any refund.
    /// Pending, processing and failed payments contribute nothing.
    pub fn net_line_items(&self) -> Vec<PaymentLineItem> {
        match self.status {
            PaymentStatus::Completed => self.line_items.clone(),
            PaymentStatus::PartialRefund => {
                let refund_items = self
                    .refund
                    .as_ref()
                    .map(|r| r.line_items.clone())
                    .unwrap_or_default();
                self.line_items
                    .iter()
                    .filter_map(|li| {
                        let refunded: Decimal = refund_items
                            .iter()
                            .filter(|r| r.semester == li.semester && r.fee_type == li.fee_type)
                            .map(|r| r.amount)
                            .sum();
                        let net = (li.amount - refunded).max(Decimal::ZERO);
                        (net > Decimal::ZERO).then(|| PaymentLineItem {
                            semester: li.semester,
                            fee_type: li.fee_type,
                            amount: net,
                        })
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Net amount counting toward balances (used for hostel payments,
    /// which carry no line items)
    pub fn net_amount(&self) -> Decimal {
        match self.status {
            PaymentStatus::Completed => self.amount_paid,
            PaymentStatus::PartialRefund => {
                let refunded = self.refund.as_ref().map(|r| r.amount).unwrap_or_default();
                (self.amount_paid - refunded).max(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        }
    }
}
