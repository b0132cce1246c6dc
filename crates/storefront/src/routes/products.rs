//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use choco_bliss_core::ProductId;

use crate::error::Result;
use crate::filters;
use crate::middleware::{Flashes, OptionalAuth};
use crate::routes::layout::Layout;
use crate::state::AppState;
use crate::supabase::{Category, Product, ProductVariant};

/// Product card data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: String,
    pub variants: Vec<VariantView>,
}

/// Variant option data for templates.
#[derive(Clone)]
pub struct VariantView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub available: bool,
}

/// Category filter tab.
#[derive(Clone)]
pub struct CategoryTabView {
    pub name: String,
    pub slug: String,
    pub selected: bool,
}

impl From<&ProductVariant> for VariantView {
    fn from(variant: &ProductVariant) -> Self {
        Self {
            id: variant.id.to_string(),
            name: variant.variant_name.clone(),
            price: variant.unit_price().display(),
            available: variant.is_available,
        }
    }
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            image_url: product.image_url.clone(),
            price: product.starting_price().display(),
            variants: product.variants.iter().map(VariantView::from).collect(),
        }
    }
}

impl ProductView {
    /// Whether any variant can be added to the cart.
    #[must_use]
    pub fn has_available_variant(&self) -> bool {
        self.variants.iter().any(|v| v.available)
    }
}

/// Query parameters for the product listing.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub heading: String,
    pub categories: Vec<CategoryTabView>,
    pub all_selected: bool,
    pub products: Vec<ProductView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
}

/// Display product listing page, optionally filtered by category slug.
///
/// An unknown slug shows every product rather than an empty page.
#[instrument(skip(state, auth, flashes))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    flashes: Flashes,
    Query(query): Query<ListingQuery>,
) -> impl IntoResponse {
    let mut layout = Layout::new(&state, auth.as_ref(), flashes);
    let slug = query.category.as_deref().filter(|s| !s.is_empty());

    let categories: Vec<Category> = state
        .supabase()
        .list_categories()
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load categories");
            Vec::new()
        });
    let current = slug.and_then(|s| categories.iter().find(|c| c.slug == s));

    let products = match state.supabase().list_products(slug).await {
        Ok(products) => products.iter().map(ProductView::from).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load products");
            layout.error("Failed to load products");
            Vec::new()
        }
    };

    ProductsIndexTemplate {
        layout,
        heading: current.map_or_else(|| "Our Chocolates".to_string(), |c| c.name.clone()),
        all_selected: current.is_none(),
        categories: categories
            .iter()
            .map(|c| CategoryTabView {
                name: c.name.clone(),
                slug: c.slug.clone(),
                selected: current.is_some_and(|cur| cur.id == c.id),
            })
            .collect(),
        products,
    }
}

/// Display product detail page with its variant options.
///
/// # Errors
///
/// Returns 404 when the product does not exist or is no longer active.
#[instrument(skip(state, auth, flashes), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
    flashes: Flashes,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let product = state.supabase().get_product(id).await?;

    Ok(ProductShowTemplate {
        layout: Layout::new(&state, auth.as_ref(), flashes),
        product: ProductView::from(&product),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use choco_bliss_core::VariantId;

    use super::*;

    fn variant(price: &str, available: bool) -> ProductVariant {
        ProductVariant {
            id: VariantId::generate(),
            product_id: ProductId::generate(),
            variant_name: "Box of 6".to_string(),
            price: Decimal::from_str(price).unwrap_or_default(),
            is_available: available,
        }
    }

    #[test]
    fn test_product_view_formats_prices() {
        let product = Product {
            id: ProductId::generate(),
            name: "Pistachio Kunafa".to_string(),
            description: None,
            base_price: Decimal::from(449),
            image_url: None,
            category_id: None,
            is_active: true,
            variants: vec![variant("449", false), variant("849.5", true)],
        };

        let view = ProductView::from(&product);
        assert_eq!(view.price, "₹449.00");
        assert_eq!(view.description, "");
        assert_eq!(view.variants[1].price, "₹849.50");
        assert!(view.has_available_variant());
    }

    #[test]
    fn test_sold_out_product() {
        let product = Product {
            id: ProductId::generate(),
            name: "Ruby Bar".to_string(),
            description: Some("Seasonal".to_string()),
            base_price: Decimal::from(299),
            image_url: None,
            category_id: None,
            is_active: true,
            variants: vec![variant("299", false)],
        };
        assert!(!ProductView::from(&product).has_available_variant());
    }
}
