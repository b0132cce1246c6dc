//! Payment gateway client.
//!
//! The gateway hosts the payment form; we only create gateway orders,
//! verify the signature the widget hands back, and look up payments when
//! reconciling.
//!
//! # Flow
//!
//! 1. [`RazorpayClient::create_order`] registers the amount (in paise) and
//!    returns a gateway order id.
//! 2. The browser opens the hosted widget with that id and our public key.
//! 3. On success the widget returns `payment_id` and `signature`;
//!    [`RazorpayClient::verify_payment_signature`] checks the signature
//!    before the order is finalized.

mod client;
mod signature;
mod types;

pub use client::RazorpayClient;
pub use signature::sign as sign_payment;
pub use types::{GatewayOrder, GatewayPayment, PaymentCallback, PaymentStatus};

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Callback signature did not match.
    #[error("Payment signature mismatch")]
    InvalidSignature,

    /// Amount cannot be charged (zero, negative, or out of range).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
