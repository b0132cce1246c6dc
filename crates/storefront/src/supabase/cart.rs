//! Cart operations. Every call runs under the customer's access token and
//! filters by `user_id`.

use tracing::{info, instrument};

use choco_bliss_core::{CartItemId, ProductId, UserId, VariantId};

use super::client::{Credential, SupabaseClient};
use super::query::Query;
use super::types::{CartItem, CartRow, MAX_LINE_QUANTITY, NewCartItem};
use super::SupabaseError;

const CART_COLUMNS: &str = "
    id, quantity,
    product:products(id, name, image_url),
    variant:product_variants(id, variant_name, price)
";

impl SupabaseClient {
    /// The customer's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn cart_items(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
    ) -> Result<Vec<CartItem>, SupabaseError> {
        self.select(
            credential,
            "cart_items",
            &Query::new()
                .select(CART_COLUMNS)
                .eq("user_id", user_id)
                .order("created_at", false),
        )
        .await
    }

    /// Add one unit of `variant_id` to the cart.
    ///
    /// A cart holds at most one line per variant; adding a variant that is
    /// already there bumps its quantity, up to [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the product is inactive or the variant is not
    /// available, `NotFound` if either does not exist.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn add_to_cart(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<(), SupabaseError> {
        let product = self.get_product(product_id).await?;
        let variant = product
            .variant(variant_id)
            .ok_or_else(|| SupabaseError::NotFound(format!("variant {variant_id}")))?;
        if !variant.is_available {
            return Err(SupabaseError::Rejected(format!(
                "{} ({}) is not available",
                product.name, variant.variant_name
            )));
        }

        let existing: Vec<CartRow> = self
            .select(
                credential,
                "cart_items",
                &Query::new()
                    .select("id,quantity")
                    .eq("user_id", user_id)
                    .eq("variant_id", variant_id)
                    .limit(1),
            )
            .await?;

        if let Some(row) = existing.into_iter().next() {
            let quantity = row.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
            let _: Vec<CartRow> = self
                .update(
                    credential,
                    "cart_items",
                    &Query::new().eq("id", row.id).eq("user_id", user_id),
                    &serde_json::json!({ "quantity": quantity }),
                )
                .await?;
            info!(cart_item_id = %row.id, "Incremented cart line");
        } else {
            let _: Vec<CartRow> = self
                .insert(
                    credential,
                    "cart_items",
                    &NewCartItem {
                        user_id,
                        product_id,
                        variant_id,
                        quantity: 1,
                    },
                )
                .await?;
            info!(%variant_id, "Added cart line");
        }

        Ok(())
    }

    /// Set a line's quantity. Quantities below 1 are ignored and larger ones
    /// are capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn update_cart_quantity(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), SupabaseError> {
        if quantity < 1 {
            return Ok(());
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);

        let _: Vec<CartRow> = self
            .update(
                credential,
                "cart_items",
                &Query::new().eq("id", item_id).eq("user_id", user_id),
                &serde_json::json!({ "quantity": quantity }),
            )
            .await?;
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn remove_cart_item(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), SupabaseError> {
        self.delete(
            credential,
            "cart_items",
            &Query::new().eq("id", item_id).eq("user_id", user_id),
        )
        .await
    }

    /// Empty the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn clear_cart(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
    ) -> Result<(), SupabaseError> {
        self.delete(credential, "cart_items", &Query::new().eq("user_id", user_id))
            .await
    }
}
