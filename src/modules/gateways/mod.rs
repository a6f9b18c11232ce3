// Payment gateway module

pub mod services;

pub use services::{GatewayOrder, OrderNotes, OrderRequest, PaymentGateway, RazorpayClient};
