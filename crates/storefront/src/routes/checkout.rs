//! Checkout route handlers.
//!
//! ```text
//! GET  /checkout         shipping form + order summary
//! POST /checkout         create order + gateway order, render payment page
//! POST /checkout/verify  widget success callback
//! POST /checkout/cancel  widget dismissed
//! ```
//!
//! The payment page opens the hosted widget from an inline script carrying
//! the request's CSP nonce. The widget's result is posted back through one of
//! two hidden forms on that page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use choco_bliss_core::{OrderId, Price, ShippingDetails};

use crate::filters;
use crate::middleware::security_headers::CHECKOUT_SCRIPT_ORIGIN;
use crate::middleware::{CspNonce, Flashes, RequireAuth};
use crate::models::{Flash, session_keys};
use crate::razorpay::PaymentCallback;
use crate::routes::cart::CartView;
use crate::routes::flash_redirect;
use crate::routes::layout::Layout;
use crate::services::{CheckoutError, PaymentIntent};
use crate::state::AppState;
use crate::supabase::{AuthSession, STORE_CURRENCY};

/// Payment page data for the widget.
#[derive(Clone)]
pub struct PaymentView {
    pub order_id: String,
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub amount_display: String,
    pub currency: String,
    pub key_id: String,
    pub prefill_name: String,
    pub prefill_phone: String,
    pub prefill_email: String,
}

impl PaymentView {
    fn new(intent: PaymentIntent, amount_display: String) -> Self {
        Self {
            order_id: intent.order_id.to_string(),
            gateway_order_id: intent.gateway_order_id,
            amount_minor: intent.amount_minor,
            amount_display,
            currency: intent.currency,
            key_id: intent.key_id,
            prefill_name: intent.prefill_name,
            prefill_phone: intent.prefill_phone,
            prefill_email: intent.prefill_email.unwrap_or_default(),
        }
    }
}

/// Shipping form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl From<ShippingForm> for ShippingDetails {
    fn from(form: ShippingForm) -> Self {
        Self {
            name: form.name,
            phone: form.phone,
            address: form.address,
            city: form.city,
            state: form.state,
            pincode: form.pincode,
        }
    }
}

/// Widget success callback, relayed by the payment page.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Widget dismissed without paying.
#[derive(Debug, Deserialize)]
pub struct CancelForm {
    pub order_id: OrderId,
}

/// Shipping form page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub shipping: ShippingDetails,
}

/// Payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/pay.html")]
pub struct CheckoutPayTemplate {
    pub layout: Layout,
    pub payment: PaymentView,
    pub nonce: String,
    pub widget_script: String,
}

/// Display the shipping form and order summary.
///
/// Prefills from the last submitted form, then from the customer's profile.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    flashes: Flashes,
) -> Response {
    let items = match state
        .supabase()
        .cart_items(auth.credential(), auth.user.id)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Failed to load cart for checkout");
            return flash_redirect(&session, Flash::error("Failed to load cart"), "/cart").await;
        }
    };

    let cart = CartView::from_items(&items);
    if cart.is_empty() {
        return flash_redirect(&session, Flash::error("Your cart is empty"), "/cart").await;
    }

    let shipping = match session
        .get::<ShippingDetails>(session_keys::SHIPPING_DRAFT)
        .await
        .ok()
        .flatten()
    {
        Some(draft) => draft,
        None => shipping_from_profile(&state, &auth).await,
    };

    CheckoutShowTemplate {
        layout: Layout::new(&state, Some(&auth), flashes),
        cart,
        shipping,
    }
    .into_response()
}

async fn shipping_from_profile(state: &AppState, auth: &AuthSession) -> ShippingDetails {
    let profile = state
        .supabase()
        .profile(auth.credential(), auth.user.id)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load profile for prefill");
            None
        });

    ShippingDetails {
        name: profile
            .as_ref()
            .and_then(|p| p.full_name.clone())
            .or_else(|| auth.user.user_metadata.full_name.clone())
            .unwrap_or_default(),
        phone: profile.and_then(|p| p.phone).unwrap_or_default(),
        ..ShippingDetails::default()
    }
}

/// Start checkout: create the order and the gateway order, then render the
/// payment page.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    nonce: CspNonce,
    flashes: Flashes,
    Form(form): Form<ShippingForm>,
) -> Response {
    let shipping = ShippingDetails::from(form);
    if let Err(e) = session.insert(session_keys::SHIPPING_DRAFT, &shipping).await {
        warn!(error = %e, "Failed to keep shipping draft");
    }

    let intent = match state.checkout().begin(&auth, &shipping).await {
        Ok(intent) => intent,
        Err(CheckoutError::EmptyCart) => {
            return flash_redirect(&session, Flash::error("Your cart is empty"), "/cart").await;
        }
        Err(e) => {
            if !matches!(e, CheckoutError::InvalidShipping(_)) {
                error!(error = %e, "Checkout failed");
            }
            return flash_redirect(&session, Flash::error(e.user_message()), "/checkout").await;
        }
    };

    let amount_display = Price::from_minor_units(intent.amount_minor, STORE_CURRENCY).display();

    CheckoutPayTemplate {
        layout: Layout::new(&state, Some(&auth), flashes),
        payment: PaymentView::new(intent, amount_display),
        nonce: nonce.0,
        widget_script: format!("{CHECKOUT_SCRIPT_ORIGIN}/v1/checkout.js"),
    }
    .into_response()
}

/// Finalize an order after the widget reports a successful payment.
#[instrument(skip_all, fields(user_id = %auth.user.id, order_id = %form.order_id))]
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<VerifyForm>,
) -> Response {
    let callback = PaymentCallback {
        razorpay_order_id: form.razorpay_order_id,
        razorpay_payment_id: form.razorpay_payment_id,
        razorpay_signature: form.razorpay_signature,
    };

    match state.checkout().complete(&auth, form.order_id, &callback).await {
        Ok(order_id) => {
            info!(%order_id, "Payment verified");
            if let Err(e) = session
                .remove::<ShippingDetails>(session_keys::SHIPPING_DRAFT)
                .await
            {
                warn!(error = %e, "Failed to drop shipping draft");
            }
            flash_redirect(
                &session,
                Flash::success("Payment successful! Order placed."),
                "/account",
            )
            .await
        }
        Err(e) => {
            warn!(error = %e, "Payment verification failed");
            flash_redirect(&session, Flash::error(e.user_message()), "/cart").await
        }
    }
}

/// The customer closed the widget without paying.
#[instrument(skip_all, fields(user_id = %auth.user.id, order_id = %form.order_id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<CancelForm>,
) -> Response {
    if let Err(e) = state.checkout().cancel(&auth, form.order_id).await {
        warn!(error = %e, "Failed to cancel order");
    }
    flash_redirect(&session, Flash::error("Payment cancelled"), "/checkout").await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_shipping_fields_are_reported() {
        let form = ShippingForm {
            name: " Devi Shah ".to_string(),
            city: "Surat".to_string(),
            ..ShippingForm::default()
        };
        let details = ShippingDetails::from(form);
        assert_eq!(details.city, "Surat");
        assert!(details.pincode.is_empty());
        let errors = details.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_payment_view_blank_email() {
        let intent = PaymentIntent {
            order_id: OrderId::generate(),
            gateway_order_id: "order_Q1w2E3r4".to_string(),
            amount_minor: 89_800,
            currency: "INR".to_string(),
            key_id: "rzp_test_abc".to_string(),
            prefill_name: "Devi".to_string(),
            prefill_phone: "9023974421".to_string(),
            prefill_email: None,
        };
        let view = PaymentView::new(intent, "₹898.00".to_string());
        assert_eq!(view.prefill_email, "");
        assert_eq!(view.amount_minor, 89_800);
    }
}
