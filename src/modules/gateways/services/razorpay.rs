use super::gateway_trait::{GatewayOrder, OrderRequest, PaymentGateway};
use crate::core::{AppError, Currency, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

/// Razorpay payment gateway client
///
/// Implements PaymentGateway for the Razorpay Orders API
/// API Documentation: https://razorpay.com/docs/api/orders/
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayClient {
    /// Create a new Razorpay client
    ///
    /// # Arguments
    /// * `key_id` - Razorpay key id (from RAZORPAY_KEY_ID env var)
    /// * `key_secret` - Razorpay key secret, also used for signature verification
    /// * `base_url` - API base URL (defaults to production)
    pub fn new(key_id: String, key_secret: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            key_id,
            key_secret,
            base_url: base_url.unwrap_or_else(|| "https://api.razorpay.com".to_string()),
        }
    }

    /// Razorpay bills in the currency's smallest unit (paise for INR)
    fn to_smallest_unit(amount: Decimal, currency: Currency) -> Result<i64> {
        let scaled = currency.round(amount) * Decimal::from(100);
        scaled
            .to_i64()
            .ok_or_else(|| AppError::gateway(format!("Amount {} out of range", amount)))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder> {
        let url = format!("{}/v1/orders", self.base_url);

        let amount = Self::to_smallest_unit(request.amount, request.currency)?;
        let razorpay_request = json!({
            "amount": amount,
            "currency": request.currency.to_string(),
            "receipt": request.receipt,
            "notes": request.notes,
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(&razorpay_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AppError::gateway(format!(
                        "Razorpay gateway unavailable: {} ({})",
                        if e.is_timeout() {
                            "timeout"
                        } else {
                            "connection failed"
                        },
                        e
                    ))
                } else {
                    AppError::gateway(format!("Razorpay API request failed: {}", e))
                }
            })?;

        let status_code = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::gateway(format!("Failed to read Razorpay response: {}", e)))?;

        if !status_code.is_success() {
            return Err(AppError::gateway(format!(
                "Razorpay API error - HTTP {} ({})",
                status_code.as_u16(),
                response_body
            )));
        }

        let razorpay_response: RazorpayOrderResponse = serde_json::from_str(&response_body)
            .map_err(|e| AppError::gateway(format!("Failed to parse Razorpay response: {}", e)))?;

        Ok(GatewayOrder {
            gateway_order_id: razorpay_response.id,
            amount: Decimal::from(razorpay_response.amount) / Decimal::from(100),
            currency: request.currency,
        })
    }

    /// Razorpay checkout signature: HMAC-SHA256 over "order_id|payment_id"
    /// keyed with the key secret, hex-encoded
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut mac = Hmac::<Sha256>::new_from_slice(self.key_secret.as_bytes())
            .map_err(|e| AppError::internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

        // A malformed signature is a failed verification, not an error
        let Ok(provided) = hex::decode(signature) else {
            return Ok(false);
        };
        Ok(mac.verify_slice(&provided).is_ok())
    }

    fn name(&self) -> &str {
        "razorpay"
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
    #[allow(dead_code)]
    currency: String,
    #[allow(dead_code)]
    status: String,
}
