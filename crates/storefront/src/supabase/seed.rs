//! Catalog writes for the seeding CLI. Every call needs the service key.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use choco_bliss_core::{CategoryId, ProductId};

use super::client::{Credential, SupabaseClient};
use super::types::{Category, Product, ProductVariant};
use super::SupabaseError;

/// Insert payload for `categories`.
#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Insert payload for `products`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    pub is_active: bool,
}

/// Insert payload for `product_variants`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProductVariant {
    pub product_id: ProductId,
    pub variant_name: String,
    pub price: Decimal,
    pub is_available: bool,
}

impl SupabaseClient {
    /// Insert categories, skipping any whose slug already exists.
    ///
    /// Returns only the rows that were actually inserted.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` without the service key, or an error if
    /// the backend request fails.
    #[instrument(skip_all, fields(count = rows.len()))]
    pub async fn seed_categories(
        &self,
        rows: &[NewCategory],
    ) -> Result<Vec<Category>, SupabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let inserted: Vec<Category> = self
            .insert_ignoring_duplicates(Credential::ServiceRole, "categories", "slug", rows)
            .await?;
        info!(inserted = inserted.len(), "Seeded categories");
        self.invalidate_catalog();
        Ok(inserted)
    }

    /// Insert products.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` without the service key, or an error if
    /// the backend request fails.
    #[instrument(skip_all, fields(count = rows.len()))]
    pub async fn seed_products(&self, rows: &[NewProduct]) -> Result<Vec<Product>, SupabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let inserted: Vec<Product> = self
            .insert(Credential::ServiceRole, "products", rows)
            .await?;
        self.invalidate_catalog();
        Ok(inserted)
    }

    /// Insert product variants.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` without the service key, or an error if
    /// the backend request fails.
    #[instrument(skip_all, fields(count = rows.len()))]
    pub async fn seed_variants(
        &self,
        rows: &[NewProductVariant],
    ) -> Result<Vec<ProductVariant>, SupabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let inserted: Vec<ProductVariant> = self
            .insert(Credential::ServiceRole, "product_variants", rows)
            .await?;
        self.invalidate_catalog();
        Ok(inserted)
    }
}
