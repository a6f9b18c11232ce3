// Payment ledger and reconciliation module

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{
    Payment, PaymentLineItem, PaymentMethod, PaymentSource, PaymentStatus, PaymentType,
    RefundRecord,
};
pub use repositories::{MySqlPaymentRepository, PaymentRepository};
pub use services::{
    FeeStatus, OrderQuote, PaymentIntent, PaymentOrderBuilder, PaymentService,
    ReconciliationEngine, StudentPaymentStatus, VerificationRequest,
};
