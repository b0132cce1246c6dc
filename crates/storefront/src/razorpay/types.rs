//! Gateway request and response shapes.

use serde::{Deserialize, Serialize};

/// Order as registered with the gateway (`/v1/orders`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateOrderRequest<'a> {
    pub amount: i64,
    pub currency: &'a str,
    pub receipt: &'a str,
}

/// Lifecycle of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the customer's money has been secured.
    #[must_use]
    pub const fn is_successful(self) -> bool {
        matches!(self, Self::Authorized | Self::Captured)
    }
}

/// A payment attempt against a gateway order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PaymentCollection {
    #[serde(default)]
    pub items: Vec<GatewayPayment>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorDetail {
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields the hosted widget posts back after a successful payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_collection() {
        let json = r#"{
            "entity": "collection",
            "count": 2,
            "items": [
                {"id": "pay_1", "entity": "payment", "amount": 89800, "currency": "INR",
                 "status": "failed", "order_id": "order_A"},
                {"id": "pay_2", "entity": "payment", "amount": 89800, "currency": "INR",
                 "status": "captured", "order_id": "order_A", "method": "upi"}
            ]
        }"#;
        let payments: PaymentCollection = serde_json::from_str(json).unwrap();
        assert_eq!(payments.items.len(), 2);
        assert!(!payments.items[0].status.is_successful());
        assert!(payments.items[1].status.is_successful());
    }

    #[test]
    fn test_unknown_payment_status() {
        let status: PaymentStatus = serde_json::from_str(r#""disputed""#).unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
        assert!(!status.is_successful());
    }

    #[test]
    fn test_error_envelope() {
        let body: ErrorEnvelope = serde_json::from_str(
            r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"The amount must be atleast INR 1.00"}}"#,
        )
        .unwrap();
        assert_eq!(
            body.error.unwrap().description.as_deref(),
            Some("The amount must be atleast INR 1.00")
        );
    }
}
