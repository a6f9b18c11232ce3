pub mod payment;

pub use payment::{
    Payment, PaymentLineItem, PaymentMethod, PaymentSource, PaymentStatus, PaymentType,
    RefundRecord,
};
