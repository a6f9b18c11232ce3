use crate::core::{Currency, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment gateway contract: order creation and callback verification.
///
/// Injected into the payment service so idempotency and serialization can
/// be exercised without a live gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway and return its reference
    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder>;

    /// Verify a callback signature. A successful verification is trusted
    /// as proof of payment.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool>;

    /// Gateway name for logs and error messages
    fn name(&self) -> &str;
}

/// Order creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Our payment id, echoed back by the gateway
    pub receipt: String,

    /// Total to charge, surcharge included
    pub amount: Decimal,

    pub currency: Currency,

    pub notes: OrderNotes,
}

/// Metadata attached to a gateway order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNotes {
    pub student_id: String,
    pub assignment_id: String,
    pub payment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<u32>,
    pub academic_year: String,
}

/// Order reference returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub currency: Currency,
}
