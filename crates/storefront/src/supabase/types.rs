//! Row types for backend tables.
//!
//! Read types mirror the JSON the REST endpoint returns for our `select`
//! lists (including embedded resources). Write types carry only the columns
//! we set; the backend fills ids and timestamps.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use choco_bliss_core::{
    CartItemId, CategoryId, CurrencyCode, OrderId, OrderItemId, OrderStatus, Price, ProductId,
    ShippingDetails, UserId, VariantId,
};

/// Prices in the backend are rupee amounts.
pub const STORE_CURRENCY: CurrencyCode = CurrencyCode::INR;

/// Most units of one variant a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

// =============================================================================
// Catalog
// =============================================================================

/// Product category (`categories`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A purchasable variant of a product (`product_variants`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub variant_name: String,
    pub price: Decimal,
    pub is_available: bool,
}

impl ProductVariant {
    /// Unit price.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::new(self.price, STORE_CURRENCY)
    }
}

/// Product with its variants embedded (`products` + `product_variants`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Look up one of this product's variants.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// "From" price shown on product cards.
    #[must_use]
    pub const fn starting_price(&self) -> Price {
        Price::new(self.base_price, STORE_CURRENCY)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Product columns embedded in a cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Variant columns embedded in a cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartVariant {
    pub id: VariantId,
    pub variant_name: String,
    pub price: Decimal,
}

/// A cart line (`cart_items`) with product and variant embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub quantity: i32,
    pub product: CartProduct,
    pub variant: CartVariant,
}

impl CartItem {
    /// Unit price of the line's variant.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::new(self.variant.price, STORE_CURRENCY)
    }

    /// Quantity clamped to a non-negative count.
    #[must_use]
    pub fn quantity(&self) -> u32 {
        u32::try_from(self.quantity).unwrap_or(0)
    }

    /// Unit price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price().line_total(self.quantity())
    }
}

/// Cart total: Σ variant price × quantity.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Price {
    Price::sum(items.iter().map(CartItem::line_total), STORE_CURRENCY)
}

/// Minimal cart row used when checking for an existing line.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CartRow {
    pub id: CartItemId,
    pub quantity: i32,
}

/// Insert payload for `cart_items`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: i32,
}

// =============================================================================
// Orders
// =============================================================================

/// A line of a placed order (`order_items`). Names and price are snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<OrderItemId>,
    pub product_name: String,
    pub variant_name: String,
    pub quantity: i32,
    pub price_at_time: Decimal,
}

impl OrderItem {
    /// Snapshot price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        Price::new(self.price_at_time, STORE_CURRENCY)
            .line_total(u32::try_from(self.quantity).unwrap_or(0))
    }
}

/// An order (`orders`), optionally with its items embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_pincode: String,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl Order {
    /// Order total as a price.
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::new(self.total_amount, STORE_CURRENCY)
    }
}

/// Insert payload for `orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_pincode: String,
    pub status: OrderStatus,
}

impl NewOrder {
    /// A pending order for `user` shipping to `shipping`.
    #[must_use]
    pub fn pending(user_id: UserId, total: Price, shipping: ShippingDetails) -> Self {
        Self {
            user_id,
            total_amount: total.amount,
            shipping_name: shipping.name,
            shipping_phone: shipping.phone,
            shipping_address: shipping.address,
            shipping_city: shipping.city,
            shipping_state: shipping.state,
            shipping_pincode: shipping.pincode,
            status: OrderStatus::Pending,
        }
    }
}

/// Insert payload for `order_items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: i32,
    pub price_at_time: Decimal,
    pub product_name: String,
    pub variant_name: String,
}

impl NewOrderItem {
    /// Snapshot a cart line into an order line.
    #[must_use]
    pub fn from_cart_item(order_id: OrderId, item: &CartItem) -> Self {
        Self {
            order_id,
            product_id: item.product.id,
            variant_id: item.variant.id,
            quantity: item.quantity,
            price_at_time: item.variant.price,
            product_name: item.product.name.clone(),
            variant_name: item.variant.variant_name.clone(),
        }
    }
}

/// Partial update for `orders`.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub razorpay_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub razorpay_payment_id: Option<String>,
}

// =============================================================================
// Profiles
// =============================================================================

/// Customer profile (`profiles`), keyed by the auth user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
