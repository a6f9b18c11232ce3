// Payment service.
//
// Orchestrates order creation, gateway callback verification, office
// payments and refunds over the ledger. Every read-validate-append
// sequence for one assignment runs under an advisory lock keyed by the
// assignment id, so the balance read by the order builder and the
// subsequent ledger write are atomic with respect to other writers for
// the same student. Verification is idempotent keyed by the gateway's
// payment id: replayed callbacks never double-count.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::core::{AppError, Currency, Result};
use crate::modules::assignments::models::{FeeAssignment, StaffActor};
use crate::modules::assignments::repositories::AssignmentRepository;
use crate::modules::gateways::services::{GatewayOrder, OrderNotes, OrderRequest, PaymentGateway};
use crate::modules::payments::models::{
    Payment, PaymentLineItem, PaymentMethod, PaymentSource, PaymentStatus, RefundRecord,
};
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::payments::services::order_builder::{
    OrderQuote, PaymentIntent, PaymentOrderBuilder,
};
use crate::modules::payments::services::reconciliation::{
    ReconciliationEngine, StudentPaymentStatus,
};

/// Advisory locks keyed by assignment id: the per-student serialization
/// point for order creation and ledger appends
#[derive(Default)]
struct AssignmentLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssignmentLocks {
    async fn acquire(&self, assignment_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(assignment_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// A freshly initiated online payment together with its gateway order
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub payment: Payment,
    pub gateway_order: GatewayOrder,
}

/// Gateway callback, as relayed by the surrounding application
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Our payment id (the order receipt)
    pub payment_id: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

pub struct PaymentService {
    assignment_repo: Arc<dyn AssignmentRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    locks: AssignmentLocks,
}

impl PaymentService {
    pub fn new(
        assignment_repo: Arc<dyn AssignmentRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            assignment_repo,
            payment_repo,
            gateway,
            locks: AssignmentLocks::default(),
        }
    }

    /// Current reconciled payment state for an assignment
    pub async fn payment_status(&self, assignment_id: &str) -> Result<StudentPaymentStatus> {
        let assignment = self.load_assignment(assignment_id).await?;
        let payments = self.payment_repo.list_by_assignment(assignment_id).await?;
        ReconciliationEngine::compute_status(&assignment, &payments)
    }

    /// Price an intent without creating anything; for fee summaries
    pub async fn quote(
        &self,
        assignment_id: &str,
        intent: &PaymentIntent,
    ) -> Result<OrderQuote> {
        let assignment = self.load_assignment(assignment_id).await?;
        let payments = self.payment_repo.list_by_assignment(assignment_id).await?;
        let status = ReconciliationEngine::compute_status(&assignment, &payments)?;
        PaymentOrderBuilder::build(&assignment, &status, intent)
    }

    /// Create a gateway order and the matching pending ledger entry.
    ///
    /// The quoted figures are fixed here; verification later trusts them
    /// and never re-prices against a possibly-changed ledger.
    pub async fn initiate_payment(
        &self,
        assignment_id: &str,
        intent: &PaymentIntent,
    ) -> Result<PaymentInitiation> {
        if intent.payment_source != PaymentSource::OnlineGateway {
            return Err(AppError::validation(
                "Office payments are recorded by staff, not initiated online",
            ));
        }

        let _guard = self.locks.acquire(assignment_id).await;

        let assignment = self.load_assignment(assignment_id).await?;
        let payments = self.payment_repo.list_by_assignment(assignment_id).await?;
        let status = ReconciliationEngine::compute_status(&assignment, &payments)?;
        let quote = PaymentOrderBuilder::build(&assignment, &status, intent)?;

        let mut payment = Payment::new(
            assignment.student_id.clone(),
            assignment_id.to_string(),
            assignment.snapshot.academic_year.clone(),
            quote.payment_type,
            quote.semester,
            quote.line_items.clone(),
            quote.amount,
            quote.convenience_fee,
            PaymentMethod::RazorpayOnline,
            PaymentSource::OnlineGateway,
        )?;
        let payment_id = payment
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Payment has no ID"))?;

        // Gateway first: if order creation fails nothing is persisted and
        // the student simply retries
        let gateway_order = self
            .gateway
            .create_order(OrderRequest {
                receipt: payment_id.clone(),
                amount: quote.total_amount,
                currency: Currency::INR,
                notes: OrderNotes {
                    student_id: assignment.student_id.clone(),
                    assignment_id: assignment_id.to_string(),
                    payment_type: quote.payment_type.to_string(),
                    semester: quote.semester,
                    academic_year: assignment.snapshot.academic_year.clone(),
                },
            })
            .await?;

        payment.gateway_order_id = Some(gateway_order.gateway_order_id.clone());
        let payment = self.payment_repo.append(&payment).await?;

        info!(
            payment_id = %payment_id,
            gateway = self.gateway.name(),
            gateway_order_id = %gateway_order.gateway_order_id,
            amount = %quote.total_amount,
            "Payment order created"
        );

        Ok(PaymentInitiation {
            payment,
            gateway_order,
        })
    }

    /// Apply a verified gateway callback to the ledger.
    ///
    /// Idempotent: a callback already applied for the same gateway payment
    /// id is a no-op returning the existing ledger entry. A failed
    /// signature marks the payment failed; it is never resurrected.
    pub async fn confirm_gateway_payment(&self, request: &VerificationRequest) -> Result<Payment> {
        let pending = self
            .payment_repo
            .find_by_id(&request.payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment '{}'", request.payment_id)))?;

        let _guard = self.locks.acquire(&pending.assignment_id).await;

        // Replay check under the lock: the same callback may be retried by
        // the gateway or arrive twice concurrently
        if let Some(existing) = self
            .payment_repo
            .find_by_gateway_payment_id(&request.gateway_payment_id)
            .await?
        {
            if !matches!(existing.status, PaymentStatus::Pending | PaymentStatus::Processing) {
                info!(
                    payment_id = %request.payment_id,
                    gateway_payment_id = %request.gateway_payment_id,
                    "Gateway callback already applied (idempotent replay)"
                );
                return Ok(existing);
            }
        }

        // Re-read under the lock; the first delivery may have settled it
        let mut payment = self
            .payment_repo
            .find_by_id(&request.payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment '{}'", request.payment_id)))?;

        if payment.status == PaymentStatus::Completed {
            return Ok(payment);
        }

        if payment.gateway_order_id.as_deref() != Some(request.gateway_order_id.as_str()) {
            return Err(AppError::gateway(format!(
                "Gateway order '{}' does not belong to payment '{}'",
                request.gateway_order_id, request.payment_id
            )));
        }

        let verified = self.gateway.verify_signature(
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
        )?;

        if !verified {
            warn!(
                payment_id = %request.payment_id,
                gateway = self.gateway.name(),
                "Signature verification failed; marking payment failed"
            );
            payment.transition(PaymentStatus::Failed)?;
            self.payment_repo
                .update_status(&request.payment_id, PaymentStatus::Failed, None)
                .await?;
            return Err(AppError::gateway(format!(
                "{} signature verification failed for payment '{}'",
                self.gateway.name(),
                request.payment_id
            )));
        }

        payment.transition(PaymentStatus::Processing)?;
        self.payment_repo
            .update_status(&request.payment_id, PaymentStatus::Processing, None)
            .await?;

        payment.transition(PaymentStatus::Completed)?;
        payment.gateway_payment_id = Some(request.gateway_payment_id.clone());
        self.payment_repo
            .update_status(
                &request.payment_id,
                PaymentStatus::Completed,
                Some(&request.gateway_payment_id),
            )
            .await?;

        info!(
            payment_id = %request.payment_id,
            gateway_payment_id = %request.gateway_payment_id,
            amount = %payment.total_amount_charged,
            "Payment completed"
        );

        self.payment_repo
            .find_by_id(&request.payment_id)
            .await?
            .ok_or_else(|| AppError::internal("Payment vanished after completion"))
    }

    /// Record a payment taken at the office counter. No gateway round
    /// trip and no convenience fee; the ledger entry is completed at once.
    pub async fn record_office_payment(
        &self,
        assignment_id: &str,
        intent: &PaymentIntent,
        method: PaymentMethod,
        recorded_by: StaffActor,
    ) -> Result<Payment> {
        if intent.payment_source != PaymentSource::ManualOffice {
            return Err(AppError::validation(
                "Online payments must go through payment initiation",
            ));
        }

        let _guard = self.locks.acquire(assignment_id).await;

        let assignment = self.load_assignment(assignment_id).await?;
        let payments = self.payment_repo.list_by_assignment(assignment_id).await?;
        let status = ReconciliationEngine::compute_status(&assignment, &payments)?;
        let quote = PaymentOrderBuilder::build(&assignment, &status, intent)?;

        let mut payment = Payment::new(
            assignment.student_id.clone(),
            assignment_id.to_string(),
            assignment.snapshot.academic_year.clone(),
            quote.payment_type,
            quote.semester,
            quote.line_items,
            quote.amount,
            quote.convenience_fee,
            method,
            PaymentSource::ManualOffice,
        )?;
        payment.recorded_by = Some(recorded_by);
        payment.transition(PaymentStatus::Processing)?;
        payment.transition(PaymentStatus::Completed)?;

        let payment = self.payment_repo.append(&payment).await?;

        info!(
            payment_id = ?payment.id,
            student_id = %payment.student_id,
            amount = %payment.amount_paid,
            "Office payment recorded"
        );

        Ok(payment)
    }

    /// Refund a completed payment in full
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        reason: Option<String>,
        refunded_by: StaffActor,
    ) -> Result<Payment> {
        let payment = self.load_payment(payment_id).await?;
        let refund = RefundRecord {
            amount: payment.amount_paid,
            line_items: payment.line_items.clone(),
            reason,
            refunded_by,
            refunded_at: chrono::Utc::now(),
        };
        self.apply_refund(payment_id, refund).await
    }

    /// Refund part of a completed payment. For hostel payments the line
    /// items are empty and only the amount applies.
    pub async fn partial_refund(
        &self,
        payment_id: &str,
        amount: rust_decimal::Decimal,
        line_items: Vec<PaymentLineItem>,
        reason: Option<String>,
        refunded_by: StaffActor,
    ) -> Result<Payment> {
        let refund = RefundRecord {
            amount,
            line_items,
            reason,
            refunded_by,
            refunded_at: chrono::Utc::now(),
        };
        self.apply_refund(payment_id, refund).await
    }

    async fn apply_refund(&self, payment_id: &str, refund: RefundRecord) -> Result<Payment> {
        let located = self.load_payment(payment_id).await?;
        let _guard = self.locks.acquire(&located.assignment_id).await;

        let mut payment = self.load_payment(payment_id).await?;
        payment.apply_refund(refund.clone())?;
        self.payment_repo
            .store_refund(payment_id, payment.status, &refund)
            .await?;

        info!(
            payment_id = %payment_id,
            refund_amount = %refund.amount,
            status = %payment.status,
            "Refund recorded"
        );

        self.payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::internal("Payment vanished after refund"))
    }

    async fn load_assignment(&self, assignment_id: &str) -> Result<FeeAssignment> {
        let assignment = self
            .assignment_repo
            .find_by_id(assignment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee assignment '{}'", assignment_id)))?;

        if !assignment.is_active {
            return Err(AppError::validation(format!(
                "Fee assignment '{}' is no longer active",
                assignment_id
            )));
        }
        Ok(assignment)
    }

    async fn load_payment(&self, payment_id: &str) -> Result<Payment> {
        self.payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment '{}'", payment_id)))
    }
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("gateway", &self.gateway.name())
            .finish()
    }
}
