//! Checkout orchestration.
//!
//! ```text
//! cart ──begin──► order (pending) + order_items ──► gateway order
//!                       │                               │
//!                       │ gateway fails                 │ widget
//!                       ▼                               ▼
//!                    failed ◄── reconcile ──►   complete: verify signature
//!                                                      │
//!                                                      ▼
//!                                               paid, cart cleared
//! ```
//!
//! The order and its items are written before the customer pays, so the
//! stored total always matches the stored lines. Finalization only happens
//! after the gateway's callback signature checks out.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use choco_bliss_core::{OrderId, OrderStatus, ShippingDetails, ShippingFieldError};

use crate::razorpay::{PaymentCallback, RazorpayClient, RazorpayError};
use crate::supabase::{
    AuthSession, Credential, NewOrder, NewOrderItem, Order, SupabaseClient, SupabaseError,
    cart_total,
};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to buy.
    #[error("cart is empty")]
    EmptyCart,

    /// Shipping form failed validation.
    #[error("invalid shipping details ({} fields)", .0.len())]
    InvalidShipping(Vec<ShippingFieldError>),

    /// The gateway refused to create a payment order.
    #[error("payment initialization failed: {0}")]
    PaymentInit(#[source] RazorpayError),

    /// The callback signature did not verify.
    #[error("payment signature mismatch")]
    InvalidSignature,

    /// The callback refers to a different gateway order than ours.
    #[error("gateway order does not match order {0}")]
    GatewayMismatch(OrderId),

    /// The order is in a status that cannot be paid.
    #[error("order is {0}")]
    InvalidState(OrderStatus),

    /// Backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Gateway call failed (outside order creation).
    #[error("gateway error: {0}")]
    Gateway(#[from] RazorpayError),
}

impl CheckoutError {
    /// Short message suitable for a toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => "Your cart is empty".to_string(),
            Self::InvalidShipping(errors) => errors
                .first()
                .map_or_else(|| "Please fill in all fields".to_string(), ToString::to_string),
            Self::PaymentInit(_) => "Failed to initialize payment".to_string(),
            Self::InvalidSignature | Self::GatewayMismatch(_) => {
                "Payment verification failed".to_string()
            }
            Self::InvalidState(_) => "This order can no longer be paid".to_string(),
            Self::Backend(_) | Self::Gateway(_) => "Failed to process order".to_string(),
        }
    }
}

/// Everything the payment page needs to open the hosted widget.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    /// Amount in minor units, as registered with the gateway.
    pub amount_minor: i64,
    pub currency: String,
    /// Public key for the widget.
    pub key_id: String,
    pub prefill_name: String,
    pub prefill_phone: String,
    pub prefill_email: Option<String>,
}

/// What reconciliation did with an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A successful gateway payment was found; the order is now paid.
    Paid { payment_id: String },
    /// No payment arrived in time; the order is now failed.
    Failed,
    /// The order was cancelled but the gateway still took the money. The
    /// order stays cancelled; the payment needs a manual refund.
    PaidAfterCancel { payment_id: String },
    /// Nothing to do yet.
    Unchanged,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    supabase: &'a SupabaseClient,
    razorpay: &'a RazorpayClient,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(supabase: &'a SupabaseClient, razorpay: &'a RazorpayClient) -> Self {
        Self { supabase, razorpay }
    }

    /// Turn the customer's cart into a pending order and a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `InvalidShipping`, or `PaymentInit` for the
    /// customer-facing failures; backend errors otherwise. When the gateway
    /// refuses, the new order is marked failed before returning.
    #[instrument(skip_all, fields(user_id = %session.user.id))]
    pub async fn begin(
        &self,
        session: &AuthSession,
        shipping: &ShippingDetails,
    ) -> Result<PaymentIntent, CheckoutError> {
        let credential = session.credential();
        let user_id = session.user.id;

        let items: Vec<_> = self
            .supabase
            .cart_items(credential, user_id)
            .await?
            .into_iter()
            .filter(|item| item.quantity() > 0)
            .collect();
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping = shipping.validate().map_err(CheckoutError::InvalidShipping)?;
        let total = cart_total(&items);

        let order = self
            .supabase
            .create_order(credential, &NewOrder::pending(user_id, total, shipping.clone()))
            .await?;

        let lines: Vec<NewOrderItem> = items
            .iter()
            .map(|item| NewOrderItem::from_cart_item(order.id, item))
            .collect();
        if let Err(e) = self.supabase.insert_order_items(credential, &lines).await {
            self.mark_failed(credential, order.id).await;
            return Err(e.into());
        }

        let gateway_order = match self
            .razorpay
            .create_order(&total, &order.id.to_string())
            .await
        {
            Ok(gateway_order) => gateway_order,
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Gateway order creation failed");
                self.mark_failed(credential, order.id).await;
                return Err(CheckoutError::PaymentInit(e));
            }
        };

        self.supabase
            .attach_gateway_order(credential, order.id, &gateway_order.id)
            .await?;

        info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            total = %total,
            "Checkout started"
        );

        Ok(PaymentIntent {
            order_id: order.id,
            gateway_order_id: gateway_order.id,
            amount_minor: gateway_order.amount,
            currency: gateway_order.currency,
            key_id: self.razorpay.key_id().to_string(),
            prefill_name: shipping.name,
            prefill_phone: shipping.phone,
            prefill_email: session.user.email.clone(),
        })
    }

    /// Finalize an order after the widget reports success.
    ///
    /// Completing an already-paid order succeeds without doing anything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` or `GatewayMismatch` when the callback
    /// cannot be trusted, `InvalidState` when the order was cancelled.
    #[instrument(skip_all, fields(user_id = %session.user.id, order_id = %order_id))]
    pub async fn complete(
        &self,
        session: &AuthSession,
        order_id: OrderId,
        callback: &PaymentCallback,
    ) -> Result<OrderId, CheckoutError> {
        self.razorpay
            .verify_payment_signature(
                &callback.razorpay_order_id,
                &callback.razorpay_payment_id,
                &callback.razorpay_signature,
            )
            .map_err(|_| {
                warn!("Rejected payment callback with bad signature");
                CheckoutError::InvalidSignature
            })?;

        let credential = session.credential();
        let user_id = session.user.id;
        let order = self
            .supabase
            .order_for_user(credential, user_id, order_id)
            .await?;

        if order.razorpay_order_id.as_deref() != Some(callback.razorpay_order_id.as_str()) {
            warn!("Payment callback for a different gateway order");
            return Err(CheckoutError::GatewayMismatch(order_id));
        }

        match order.status {
            OrderStatus::Paid => {
                info!("Order already paid");
                return Ok(order_id);
            }
            OrderStatus::Cancelled => {
                error!(
                    payment_id = %callback.razorpay_payment_id,
                    "Payment received for a cancelled order"
                );
                return Err(CheckoutError::InvalidState(OrderStatus::Cancelled));
            }
            OrderStatus::Pending | OrderStatus::Failed => {}
        }

        let updated = self
            .supabase
            .transition_order(
                credential,
                order_id,
                order.status,
                OrderStatus::Paid,
                Some(&callback.razorpay_payment_id),
            )
            .await?;

        if updated.is_none() {
            let current = self
                .supabase
                .order_for_user(credential, user_id, order_id)
                .await?;
            if current.status != OrderStatus::Paid {
                return Err(CheckoutError::InvalidState(current.status));
            }
            return Ok(order_id);
        }

        self.supabase.clear_cart(credential, user_id).await?;

        info!(payment_id = %callback.razorpay_payment_id, "Order paid");
        Ok(order_id)
    }

    /// The customer closed the widget without paying.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the update fails.
    #[instrument(skip_all, fields(user_id = %session.user.id, order_id = %order_id))]
    pub async fn cancel(
        &self,
        session: &AuthSession,
        order_id: OrderId,
    ) -> Result<(), CheckoutError> {
        let cancelled = self
            .supabase
            .transition_order(
                session.credential(),
                order_id,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                None,
            )
            .await?;

        if cancelled.is_some() {
            info!("Checkout cancelled");
        }
        Ok(())
    }

    /// Settle an order whose callback never arrived, using the gateway's
    /// record of payments. Runs under the service key.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway or backend call fails.
    #[instrument(skip_all, fields(order_id = %order.id, status = %order.status))]
    pub async fn reconcile(
        &self,
        order: &Order,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, CheckoutError> {
        match order.status {
            OrderStatus::Paid => return Ok(ReconcileOutcome::Unchanged),
            OrderStatus::Cancelled => return self.check_cancelled(order).await,
            OrderStatus::Pending | OrderStatus::Failed => {}
        }

        let payments = match &order.razorpay_order_id {
            Some(gateway_order_id) => self.razorpay.order_payments(gateway_order_id).await?,
            None => Vec::new(),
        };

        if let Some(payment) = payments.iter().find(|p| p.status.is_successful()) {
            let updated = self
                .supabase
                .transition_order(
                    Credential::ServiceRole,
                    order.id,
                    order.status,
                    OrderStatus::Paid,
                    Some(&payment.id),
                )
                .await?;
            return Ok(match updated {
                Some(_) => {
                    info!(payment_id = %payment.id, "Reconciled order as paid");
                    ReconcileOutcome::Paid {
                        payment_id: payment.id.clone(),
                    }
                }
                None => ReconcileOutcome::Unchanged,
            });
        }

        let is_stale = now - order.created_at >= stale_after;
        if order.status == OrderStatus::Pending && is_stale {
            let updated = self
                .supabase
                .transition_order(
                    Credential::ServiceRole,
                    order.id,
                    OrderStatus::Pending,
                    OrderStatus::Failed,
                    None,
                )
                .await?;
            if updated.is_some() {
                info!(attempts = payments.len(), "Reconciled stale order as failed");
                return Ok(ReconcileOutcome::Failed);
            }
        }

        Ok(ReconcileOutcome::Unchanged)
    }

    async fn check_cancelled(&self, order: &Order) -> Result<ReconcileOutcome, CheckoutError> {
        let Some(gateway_order_id) = &order.razorpay_order_id else {
            return Ok(ReconcileOutcome::Unchanged);
        };

        let payments = self.razorpay.order_payments(gateway_order_id).await?;
        Ok(
            match payments.into_iter().find(|p| p.status.is_successful()) {
                Some(payment) => {
                    error!(
                        payment_id = %payment.id,
                        %gateway_order_id,
                        "Payment captured for a cancelled order"
                    );
                    ReconcileOutcome::PaidAfterCancel {
                        payment_id: payment.id,
                    }
                }
                None => ReconcileOutcome::Unchanged,
            },
        )
    }

    async fn mark_failed(&self, credential: Credential<'_>, order_id: OrderId) {
        if let Err(e) = self
            .supabase
            .transition_order(
                credential,
                order_id,
                OrderStatus::Pending,
                OrderStatus::Failed,
                None,
            )
            .await
        {
            error!(order_id = %order_id, error = %e, "Failed to mark order as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use choco_bliss_core::ShippingField;

    #[test]
    fn test_user_messages_are_generic() {
        let backend = CheckoutError::Backend(SupabaseError::Api {
            status: 500,
            code: Some("XX000".to_string()),
            message: "relation \"orders\" does not exist".to_string(),
        });
        assert_eq!(backend.user_message(), "Failed to process order");
        assert_eq!(
            CheckoutError::EmptyCart.user_message(),
            "Your cart is empty"
        );
        assert_eq!(
            CheckoutError::InvalidSignature.user_message(),
            "Payment verification failed"
        );
    }

    #[test]
    fn test_shipping_message_names_first_field() {
        let err = CheckoutError::InvalidShipping(vec![
            ShippingFieldError::Required(ShippingField::Name),
            ShippingFieldError::InvalidPincode,
        ]);
        assert_eq!(
            err.user_message(),
            ShippingFieldError::Required(ShippingField::Name).to_string()
        );
    }
}
