pub mod gateway_trait;
pub mod razorpay;

pub use gateway_trait::{GatewayOrder, OrderNotes, OrderRequest, PaymentGateway};
pub use razorpay::RazorpayClient;
