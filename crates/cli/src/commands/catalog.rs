//! Catalog seed file format.
//!
//! ```yaml
//! categories:
//!   - name: Classic Bars
//!     slug: classic-bars
//!     description: Timeless chocolate perfection
//!     products:
//!       - name: Dark Truffle Bar
//!         description: 70% cocoa with a ganache centre
//!         variants:
//!           - name: 100g
//!             price: "199.00"
//!           - name: 200g
//!             price: "349.00"
//!             available: false
//! ```
//!
//! `active` (products) and `available` (variants) default to `true`. A
//! product's base price is the lowest of its variant prices.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Deserialize;

use choco_bliss_core::{CategoryId, ProductId};
use choco_bliss_storefront::supabase::{NewCategory, NewProduct, NewProductVariant};

/// Whole seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub categories: Vec<CatalogCategory>,
}

/// One category and its products.
#[derive(Debug, Deserialize)]
pub struct CatalogCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub products: Vec<CatalogProduct>,
}

/// One product and its variants.
#[derive(Debug, Deserialize)]
pub struct CatalogProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub variants: Vec<CatalogVariant>,
}

/// One purchasable option.
#[derive(Debug, Deserialize)]
pub struct CatalogVariant {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub available: bool,
}

const fn default_true() -> bool {
    true
}

impl CatalogFile {
    /// Total number of products across all categories.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.categories.iter().map(|c| c.products.len()).sum()
    }

    /// Total number of variants across all products.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| &c.products)
            .map(|p| p.variants.len())
            .sum()
    }
}

impl CatalogCategory {
    /// Insert payload for this category.
    #[must_use]
    pub fn to_new(&self) -> NewCategory {
        NewCategory {
            name: self.name.trim().to_string(),
            slug: self.slug.clone(),
            description: self.description.clone(),
        }
    }
}

impl CatalogProduct {
    /// Lowest variant price, or zero for a product without variants.
    #[must_use]
    pub fn base_price(&self) -> Decimal {
        self.variants
            .iter()
            .map(|v| v.price)
            .min()
            .unwrap_or(Decimal::ZERO)
    }

    /// Insert payload for this product under `category_id`.
    #[must_use]
    pub fn to_new(&self, category_id: CategoryId) -> NewProduct {
        NewProduct {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            base_price: self.base_price(),
            image_url: self.image_url.clone(),
            category_id,
            is_active: self.active,
        }
    }
}

impl CatalogVariant {
    /// Insert payload for this variant under `product_id`.
    #[must_use]
    pub fn to_new(&self, product_id: ProductId) -> NewProductVariant {
        NewProductVariant {
            product_id,
            variant_name: self.name.trim().to_string(),
            price: self.price,
            is_available: self.available,
        }
    }
}

/// Slugs are lowercase ASCII words joined by single hyphens.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|word| {
            !word.is_empty()
                && word
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// Validate a catalog file, returning every problem found.
#[must_use]
pub fn validate(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut slugs = HashSet::new();

    if catalog.categories.is_empty() {
        errors.push("No categories defined".to_string());
    }

    for category in &catalog.categories {
        if category.name.trim().is_empty() {
            errors.push(format!("Category '{}' has an empty name", category.slug));
        }
        if !is_valid_slug(&category.slug) {
            errors.push(format!("Invalid slug '{}'", category.slug));
        }
        if !slugs.insert(category.slug.as_str()) {
            errors.push(format!("Duplicate slug '{}'", category.slug));
        }

        let mut product_names = HashSet::new();
        for product in &category.products {
            let label = format!("{}/{}", category.slug, product.name);

            if product.name.trim().is_empty() {
                errors.push(format!("Empty product name in category '{}'", category.slug));
            } else if !product_names.insert(product.name.trim()) {
                errors.push(format!("Duplicate product '{label}'"));
            }

            if product.variants.is_empty() {
                errors.push(format!("No variants for product '{label}'"));
            }

            let mut variant_names = HashSet::new();
            for variant in &product.variants {
                if variant.name.trim().is_empty() {
                    errors.push(format!("Empty variant name for product '{label}'"));
                } else if !variant_names.insert(variant.name.trim()) {
                    errors.push(format!(
                        "Duplicate variant '{}' for product '{label}'",
                        variant.name
                    ));
                }
                if variant.price <= Decimal::ZERO {
                    errors.push(format!(
                        "Non-positive price {} for '{label}' ({})",
                        variant.price, variant.name
                    ));
                }
            }
        }
    }

    errors
}
