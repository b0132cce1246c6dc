//! Catalog reads: categories and active products with their variants.
//!
//! All catalog reads are anonymous and cached.

use tracing::{debug, instrument};

use choco_bliss_core::ProductId;

use super::cache::{CacheKey, CacheValue};
use super::client::{Credential, SupabaseClient};
use super::query::Query;
use super::types::{Category, Product};
use super::SupabaseError;

const CATEGORY_COLUMNS: &str = "id,name,slug,description";

const PRODUCT_COLUMNS: &str = "
    id, name, description, base_price, image_url, category_id, is_active,
    variants:product_variants(id, product_id, variant_name, price, is_available)
";

impl SupabaseClient {
    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, SupabaseError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache().get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self
            .select(
                Credential::Anon,
                "categories",
                &Query::new().select(CATEGORY_COLUMNS).order("name", false),
            )
            .await?;

        self.cache()
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Resolve a category by slug. `None` when no category has that slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, SupabaseError> {
        Ok(self
            .list_categories()
            .await?
            .into_iter()
            .find(|c| c.slug == slug))
    }

    /// Active products, newest first, each with its variants.
    ///
    /// When `category_slug` names a known category only its products are
    /// returned; an unknown slug falls back to every active product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        category_slug: Option<&str>,
    ) -> Result<Vec<Product>, SupabaseError> {
        let category = match category_slug {
            Some(slug) => self.category_by_slug(slug).await?,
            None => None,
        };

        let cache_key = CacheKey::Products {
            category_slug: category.as_ref().map(|c| c.slug.clone()),
        };

        if let Some(CacheValue::Products(products)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let mut query = Query::new()
            .select(PRODUCT_COLUMNS)
            .eq("is_active", true);
        if let Some(category) = &category {
            query = query.eq("category_id", category.id);
        }
        let query = query.order("created_at", true);

        let products: Vec<Product> = self.select(Credential::Anon, "products", &query).await?;

        self.cache()
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// A single active product with its variants.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist or is inactive.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, SupabaseError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .select_one(
                Credential::Anon,
                "products",
                &Query::new()
                    .select(PRODUCT_COLUMNS)
                    .eq("id", id)
                    .eq("is_active", true),
                format!("product {id}"),
            )
            .await?;

        self.cache()
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }
}
