//! Cart route handlers.
//!
//! The cart lives in the backend's `cart_items` table, one row per
//! (customer, variant). Every write redirects back to a page that shows the
//! result as a flash message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use choco_bliss_core::{CartItemId, ProductId, VariantId};

use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{Flashes, OptionalAuth, RequireAuth};
use crate::models::Flash;
use crate::routes::flash_redirect;
use crate::routes::layout::Layout;
use crate::state::AppState;
use crate::supabase::{CartItem, MAX_LINE_QUANTITY, SupabaseError, cart_total};

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub variant_name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub line_price: String,
}

impl CartItemView {
    /// Quantity submitted by the "−" button.
    #[must_use]
    pub const fn decrement(&self) -> u32 {
        self.quantity.saturating_sub(1)
    }

    /// Quantity submitted by the "+" button.
    #[must_use]
    pub fn increment(&self) -> u32 {
        self.quantity.saturating_add(1).min(MAX_LINE_QUANTITY.unsigned_abs())
    }
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product.id.to_string(),
            product_name: item.product.name.clone(),
            variant_name: item.variant.variant_name.clone(),
            image_url: item.product.image_url.clone(),
            quantity: item.quantity(),
            unit_price: item.unit_price().display(),
            line_price: item.line_total().display(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Build the cart summary from backend rows.
    #[must_use]
    pub fn from_items(items: &[CartItem]) -> Self {
        let total = cart_total(items).display();
        Self {
            items: items.iter().map(CartItemView::from).collect(),
            subtotal: total.clone(),
            total,
            item_count: items
                .iter()
                .map(CartItem::quantity)
                .fold(0u32, u32::saturating_add),
        }
    }

    /// Whether there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub variant_id: VariantId,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: CartItemId,
    pub quantity: i32,
}

impl UpdateCartForm {
    /// Requested quantity, capped at [`MAX_LINE_QUANTITY`].
    #[must_use]
    pub fn quantity(&self) -> i32 {
        self.quantity.min(MAX_LINE_QUANTITY)
    }
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: CartItemId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Display cart page.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    flashes: Flashes,
) -> impl IntoResponse {
    let mut layout = Layout::new(&state, Some(&auth), flashes);

    let items = match state
        .supabase()
        .cart_items(auth.credential(), auth.user.id)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Failed to load cart");
            layout.error("Failed to load cart");
            Vec::new()
        }
    };

    CartShowTemplate {
        layout,
        cart: CartView::from_items(&items),
    }
}

/// Add one unit of a variant to the cart.
///
/// Anonymous visitors are sent to the login page instead.
#[instrument(skip(state, session, auth))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let back = format!("/products/{}", form.product_id);

    let Some(auth) = auth else {
        return flash_redirect(
            &session,
            Flash::error("Please login to add items to cart"),
            LOGIN_PATH,
        )
        .await;
    };

    let result = state
        .supabase()
        .add_to_cart(
            auth.credential(),
            auth.user.id,
            form.product_id,
            form.variant_id,
        )
        .await;

    let flash = match result {
        Ok(()) => {
            let variant_id = form.variant_id.to_string();
            add_breadcrumb("cart", "Added to cart", Some(&[("variant_id", variant_id.as_str())]));
            Flash::success("Added to cart!")
        }
        Err(SupabaseError::Rejected(reason)) => {
            warn!(%reason, "Add to cart rejected");
            Flash::error("That option is not available right now")
        }
        Err(e) => {
            warn!(error = %e, "Failed to add to cart");
            Flash::error("Failed to add to cart")
        }
    };

    flash_redirect(&session, flash, &back).await
}

/// Set a cart line's quantity. Quantities below one are ignored.
#[instrument(skip(state, session, auth), fields(user_id = %auth.user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    if let Err(e) = state
        .supabase()
        .update_cart_quantity(auth.credential(), auth.user.id, form.item_id, form.quantity())
        .await
    {
        warn!(error = %e, "Failed to update quantity");
        return flash_redirect(&session, Flash::error("Failed to update quantity"), "/cart")
            .await;
    }

    Redirect::to("/cart").into_response()
}

/// Remove a line from the cart.
#[instrument(skip(state, session, auth), fields(user_id = %auth.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let flash = match state
        .supabase()
        .remove_cart_item(auth.credential(), auth.user.id, form.item_id)
        .await
    {
        Ok(()) => Flash::success("Item removed from cart"),
        Err(e) => {
            warn!(error = %e, "Failed to remove item");
            Flash::error("Failed to remove item")
        }
    };

    flash_redirect(&session, flash, "/cart").await
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::supabase::{CartProduct, CartVariant};

    fn item(price: i64, quantity: i32) -> CartItem {
        CartItem {
            id: CartItemId::generate(),
            quantity,
            product: CartProduct {
                id: ProductId::generate(),
                name: "Classic Milk".to_string(),
                image_url: None,
            },
            variant: CartVariant {
                id: VariantId::generate(),
                variant_name: "100g".to_string(),
                price: Decimal::from(price),
            },
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let cart = CartView::from_items(&[item(199, 2), item(449, 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, "₹847.00");
        assert_eq!(cart.total, cart.subtotal);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_quantity_buttons() {
        let view = CartItemView::from(&item(100, 1));
        assert_eq!(view.decrement(), 0);
        assert_eq!(view.increment(), 2);
        assert_eq!(view.line_price, "₹100.00");
    }

    #[test]
    fn test_item_count_saturates() {
        let cart = CartView::from_items(&[
            item(1, i32::MAX),
            item(1, i32::MAX),
            item(1, i32::MAX),
        ]);
        assert_eq!(cart.item_count, u32::MAX);
    }

    #[test]
    fn test_quantity_is_capped() {
        let form = UpdateCartForm {
            item_id: CartItemId::generate(),
            quantity: i32::MAX,
        };
        assert_eq!(form.quantity(), MAX_LINE_QUANTITY);

        let view = CartItemView::from(&item(100, MAX_LINE_QUANTITY));
        assert_eq!(view.increment(), 99);
        assert_eq!(view.decrement(), 98);
    }

    #[test]
    fn test_empty_cart() {
        let cart = CartView::from_items(&[]);
        assert!(cart.is_empty());
        assert_eq!(cart.total, "₹0.00");
    }
}
