//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::{instrument, warn};

use choco_bliss_core::OrderStatus;

use crate::filters;
use crate::middleware::{Flashes, RequireAuth};
use crate::routes::layout::Layout;
use crate::state::AppState;
use crate::supabase::{Order, OrderItem, Profile};

/// Profile display data for templates.
#[derive(Clone)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderLineView {
    pub product_name: String,
    pub variant_name: String,
    pub quantity: i32,
    pub line_price: String,
}

impl From<&OrderItem> for OrderLineView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_name: item.product_name.clone(),
            variant_name: item.variant_name.clone(),
            quantity: item.quantity,
            line_price: item.line_total().display(),
        }
    }
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    /// First block of the order id, for display.
    pub number: String,
    pub placed_on: String,
    pub status: String,
    pub status_class: &'static str,
    pub total: String,
    pub ship_to: String,
    pub items: Vec<OrderLineView>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let id = order.id.to_string();
        Self {
            number: id.split('-').next().unwrap_or(&id).to_uppercase(),
            placed_on: order.created_at.format("%d %b %Y").to_string(),
            status: order.status.to_string(),
            status_class: status_class(order.status),
            total: order.total().display(),
            ship_to: format!(
                "{}, {}, {} {}",
                order.shipping_name, order.shipping_city, order.shipping_state, order.shipping_pincode
            ),
            items: order.order_items.iter().map(OrderLineView::from).collect(),
        }
    }
}

const fn status_class(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Paid => "badge--success",
        OrderStatus::Pending => "badge--pending",
        OrderStatus::Failed | OrderStatus::Cancelled => "badge--muted",
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub layout: Layout,
    pub profile: ProfileView,
    pub orders: Vec<OrderView>,
}

/// Display the customer's profile and order history, newest first.
///
/// Each half degrades on its own: a failed profile read falls back to the
/// identity in the session; a failed order read shows an empty history.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    flashes: Flashes,
) -> impl IntoResponse {
    let mut layout = Layout::new(&state, Some(&auth), flashes);
    let credential = auth.credential();
    let user_id = auth.user.id;

    let (profile, orders) = tokio::join!(
        state.supabase().profile(credential, user_id),
        state.supabase().orders_for_user(credential, user_id),
    );

    let profile: Option<Profile> = profile.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load profile");
        layout.error("Failed to load profile");
        None
    });

    let orders = match orders {
        Ok(orders) => orders.iter().map(OrderView::from).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load orders");
            layout.error("Failed to load orders");
            Vec::new()
        }
    };

    let session_name = auth.user.user_metadata.full_name.clone();
    let session_email = auth.user.email.clone();
    let profile = ProfileView {
        name: profile
            .as_ref()
            .and_then(|p| p.full_name.clone())
            .or(session_name)
            .unwrap_or_default(),
        email: profile
            .as_ref()
            .and_then(|p| p.email.clone())
            .or(session_email)
            .unwrap_or_default(),
        phone: profile.and_then(|p| p.phone),
    };

    AccountIndexTemplate {
        layout,
        profile,
        orders,
    }
}
