use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::payments::models::{Payment, PaymentStatus, RefundRecord};

/// Persistence contract for the payment ledger.
///
/// The ledger is append-only by student: completed payments are never
/// rewritten in place beyond status-machine advances and the attached
/// refund record, and nothing is ever deleted.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn append(&self, payment: &Payment) -> Result<Payment>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>>;

    /// Idempotency lookup keyed by the gateway's unique payment id
    async fn find_by_gateway_payment_id(&self, gateway_payment_id: &str)
        -> Result<Option<Payment>>;

    async fn list_by_assignment(&self, assignment_id: &str) -> Result<Vec<Payment>>;

    /// Advance the status machine, optionally recording the gateway's
    /// payment id at completion
    async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        gateway_payment_id: Option<&str>,
    ) -> Result<()>;

    /// Attach a refund record together with its status transition
    async fn store_refund(
        &self,
        id: &str,
        status: PaymentStatus,
        refund: &RefundRecord,
    ) -> Result<()>;
}

/// MySQL-backed payment ledger
pub struct MySqlPaymentRepository {
    pool: MySqlPool,
}

impl MySqlPaymentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    const SELECT_COLUMNS: &'static str = r#"
        id, student_id, assignment_id, payment_type, semester, line_items,
        amount_paid, convenience_fee, total_amount_charged, status,
        payment_method, payment_source, gateway_order_id, gateway_payment_id,
        refund, recorded_by, payment_date, academic_year, created_at, updated_at
    "#;
}

#[async_trait]
impl PaymentRepository for MySqlPaymentRepository {
    async fn append(&self, payment: &Payment) -> Result<Payment> {
        let id = payment
            .id
            .as_ref()
            .ok_or_else(|| AppError::internal("Payment ID is required for creation"))?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, student_id, assignment_id, payment_type, semester, line_items,
                amount_paid, convenience_fee, total_amount_charged, status,
                payment_method, payment_source, gateway_order_id, gateway_payment_id,
                refund, recorded_by, payment_date, academic_year
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&payment.student_id)
        .bind(&payment.assignment_id)
        .bind(payment.payment_type)
        .bind(payment.semester)
        .bind(serde_json::to_value(&payment.line_items)?)
        .bind(payment.amount_paid)
        .bind(payment.convenience_fee)
        .bind(payment.total_amount_charged)
        .bind(payment.status)
        .bind(payment.payment_method)
        .bind(payment.payment_source)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.refund.as_ref().map(serde_json::to_value).transpose()?)
        .bind(payment.recorded_by.as_ref().map(serde_json::to_value).transpose()?)
        .bind(payment.payment_date)
        .bind(&payment.academic_year)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal("Payment was created but not found"))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            Self::SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE gateway_payment_id = ?",
            Self::SELECT_COLUMNS
        ))
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn list_by_assignment(&self, assignment_id: &str) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE assignment_id = ? ORDER BY created_at ASC",
            Self::SELECT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        gateway_payment_id: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                gateway_payment_id = COALESCE(?, gateway_payment_id),
                payment_date = IF(? = 'completed', NOW(), payment_date),
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(gateway_payment_id)
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Payment '{}'", id)));
        }
        Ok(())
    }

    async fn store_refund(
        &self,
        id: &str,
        status: PaymentStatus,
        refund: &RefundRecord,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, refund = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(serde_json::to_value(refund)?)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Payment '{}'", id)));
        }
        Ok(())
    }
}
