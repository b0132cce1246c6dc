use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use choco_bliss_core::Price;

use super::signature;
use super::types::{
    CreateOrderRequest, ErrorEnvelope, GatewayOrder, GatewayPayment, PaymentCollection,
};
use super::RazorpayError;
use crate::config::RazorpayConfig;

/// Smallest chargeable amount, in paise.
const MIN_AMOUNT_MINOR: i64 = 100;

/// Payment gateway API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    /// Public key id handed to the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Register an order with the gateway.
    ///
    /// `receipt` is our own order id, so gateway records can be traced back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for amounts below the gateway minimum, or an
    /// API error if the gateway rejects the order.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_order(
        &self,
        amount: &Price,
        receipt: &str,
    ) -> Result<GatewayOrder, RazorpayError> {
        let amount_minor = amount
            .to_minor_units()
            .map_err(|e| RazorpayError::InvalidAmount(e.to_string()))?;
        if amount_minor < MIN_AMOUNT_MINOR {
            return Err(RazorpayError::InvalidAmount(format!(
                "{amount} is below the minimum charge"
            )));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency: amount.currency_code.code(),
                receipt,
            })
            .send()
            .await?;

        let order: GatewayOrder = Self::parse_response(response).await?;
        info!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }

    /// Payments attempted against a gateway order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn order_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<GatewayPayment>, RazorpayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/orders/{}/payments",
                self.api_base,
                urlencoding::encode(gateway_order_id)
            ))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        let payments: PaymentCollection = Self::parse_response(response).await?;
        Ok(payments.items)
    }

    /// Check the signature the widget returned for a payment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` when the signature does not match.
    pub fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        if signature::verify(
            self.key_secret.expose_secret().as_bytes(),
            gateway_order_id,
            payment_id,
            signature,
        ) {
            Ok(())
        } else {
            Err(RazorpayError::InvalidSignature)
        }
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RazorpayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            let message = envelope
                .error
                .and_then(|e| e.description)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, %message, "Gateway returned error");
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
