//! In-memory stand-in for the payment gateway's orders API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

/// Key id the storefront is configured with.
pub const KEY_ID: &str = "rzp_test_fake";
/// Secret shared with the storefront; signs widget callbacks.
pub const KEY_SECRET: &str = "fake-gateway-secret";

#[derive(Default)]
struct Inner {
    orders: Vec<Value>,
    payments: HashMap<String, Vec<Value>>,
    refuse_orders: bool,
    next_id: u64,
}

/// Handle to the fake gateway. Clones share state.
#[derive(Clone, Default)]
pub struct FakeRazorpay {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRazorpay {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Axum router serving `/v1/orders`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/orders", post(create_order))
            .route("/v1/orders/{id}/payments", get(order_payments))
            .with_state(self.clone())
    }

    /// Make order creation fail with a 400.
    pub fn refuse_orders(&self, refuse: bool) {
        self.lock().refuse_orders = refuse;
    }

    /// Every order created so far.
    pub fn orders(&self) -> Vec<Value> {
        self.lock().orders.clone()
    }

    /// Record a payment attempt against `order_id`.
    pub fn record_payment(&self, order_id: &str, payment_id: &str, status: &str) {
        let mut inner = self.lock();
        let amount = inner
            .orders
            .iter()
            .find(|o| o["id"] == order_id)
            .map_or(Value::Null, |o| o["amount"].clone());
        inner
            .payments
            .entry(order_id.to_string())
            .or_default()
            .push(json!({
                "id": payment_id,
                "entity": "payment",
                "amount": amount,
                "currency": "INR",
                "status": status,
                "order_id": order_id,
                "method": "upi",
            }));
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Basic {}", STANDARD.encode(format!("{KEY_ID}:{KEY_SECRET}")));
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

fn gateway_error(status: StatusCode, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": { "code": "BAD_REQUEST_ERROR", "description": description }
        })),
    )
        .into_response()
}

async fn create_order(
    State(fake): State<FakeRazorpay>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return gateway_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    let mut inner = fake.lock();
    if inner.refuse_orders {
        return gateway_error(StatusCode::BAD_REQUEST, "Order creation is disabled");
    }

    inner.next_id += 1;
    let order = json!({
        "id": format!("order_{:014}", inner.next_id),
        "entity": "order",
        "amount": body["amount"],
        "currency": body["currency"],
        "receipt": body["receipt"],
        "status": "created",
    });
    inner.orders.push(order.clone());
    Json(order).into_response()
}

async fn order_payments(
    State(fake): State<FakeRazorpay>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return gateway_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    let inner = fake.lock();
    if !inner.orders.iter().any(|o| o["id"] == id.as_str()) {
        return gateway_error(StatusCode::BAD_REQUEST, "The id provided does not exist");
    }
    let items = inner.payments.get(&id).cloned().unwrap_or_default();
    Json(json!({
        "entity": "collection",
        "count": items.len(),
        "items": items,
    }))
    .into_response()
}
