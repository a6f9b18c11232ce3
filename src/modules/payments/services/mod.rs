pub mod order_builder;
pub mod payment_service;
pub mod reconciliation;

pub use order_builder::{convenience_fee_rate, OrderQuote, PaymentIntent, PaymentOrderBuilder};
pub use payment_service::{PaymentInitiation, PaymentService, VerificationRequest};
pub use reconciliation::{
    FeeStatus, FeeTypeStatuses, HostelPaymentStatus, ReconciliationEngine, SemesterPaymentStatus,
    StudentPaymentStatus,
};
