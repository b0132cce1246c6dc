//! Order persistence.

use tracing::{info, instrument, warn};

use choco_bliss_core::{OrderId, OrderStatus, UserId};

use super::client::{Credential, SupabaseClient};
use super::query::Query;
use super::types::{NewOrder, NewOrderItem, Order, OrderPatch};
use super::SupabaseError;

const ORDER_COLUMNS: &str = "
    id, user_id, created_at, total_amount, status,
    shipping_name, shipping_phone, shipping_address,
    shipping_city, shipping_state, shipping_pincode,
    razorpay_order_id, razorpay_payment_id,
    order_items(id, product_name, variant_name, quantity, price_at_time)
";

/// Columns of the bare order row, without embedded items.
const ORDER_ROW_COLUMNS: &str = "
    id, user_id, created_at, total_amount, status,
    shipping_name, shipping_phone, shipping_address,
    shipping_city, shipping_state, shipping_pincode,
    razorpay_order_id, razorpay_payment_id
";

impl SupabaseClient {
    /// Insert a new order and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the insert.
    #[instrument(skip(self, credential, order), fields(user_id = %order.user_id))]
    pub async fn create_order(
        &self,
        credential: Credential<'_>,
        order: &NewOrder,
    ) -> Result<Order, SupabaseError> {
        let rows: Vec<Order> = self.insert(credential, "orders", order).await?;
        let order = rows
            .into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound("inserted order".to_string()))?;
        info!(order_id = %order.id, total = %order.total(), "Order created");
        Ok(order)
    }

    /// Insert the line items of an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the insert.
    #[instrument(skip(self, credential, items), fields(count = items.len()))]
    pub async fn insert_order_items(
        &self,
        credential: Credential<'_>,
        items: &[NewOrderItem],
    ) -> Result<(), SupabaseError> {
        if items.is_empty() {
            return Ok(());
        }
        let _: Vec<serde_json::Value> = self.insert(credential, "order_items", items).await?;
        Ok(())
    }

    /// Record the gateway order created for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such order is visible to `credential`.
    #[instrument(skip(self, credential), fields(order_id = %order_id))]
    pub async fn attach_gateway_order(
        &self,
        credential: Credential<'_>,
        order_id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), SupabaseError> {
        let patch = OrderPatch {
            razorpay_order_id: Some(gateway_order_id.to_string()),
            ..OrderPatch::default()
        };
        let rows: Vec<Order> = self
            .update(
                credential,
                "orders",
                &Query::new().select(ORDER_ROW_COLUMNS).eq("id", order_id),
                &patch,
            )
            .await?;
        if rows.is_empty() {
            return Err(SupabaseError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }

    /// Move an order from `from` to `to`, optionally recording the payment id.
    ///
    /// The update only applies while the stored status is still `from`, so
    /// concurrent callers cannot both win. Returns the updated order, or
    /// `None` when the order was no longer in `from`.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a transition the status machine forbids.
    #[instrument(skip(self, credential), fields(order_id = %order_id, from = %from, to = %to))]
    pub async fn transition_order(
        &self,
        credential: Credential<'_>,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        payment_id: Option<&str>,
    ) -> Result<Option<Order>, SupabaseError> {
        if !from.can_transition_to(to) {
            return Err(SupabaseError::Rejected(format!(
                "order cannot move from {from} to {to}"
            )));
        }

        let patch = OrderPatch {
            status: Some(to),
            razorpay_payment_id: payment_id.map(ToString::to_string),
            ..OrderPatch::default()
        };
        let rows: Vec<Order> = self
            .update(
                credential,
                "orders",
                &Query::new()
                    .select(ORDER_ROW_COLUMNS)
                    .eq("id", order_id)
                    .eq("status", from),
                &patch,
            )
            .await?;

        match rows.into_iter().next() {
            Some(order) => {
                info!("Order status changed");
                Ok(Some(order))
            }
            None => {
                warn!("Order was not in the expected status");
                Ok(None)
            }
        }
    }

    /// The customer's orders, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn orders_for_user(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
    ) -> Result<Vec<Order>, SupabaseError> {
        self.select(
            credential,
            "orders",
            &Query::new()
                .select(ORDER_COLUMNS)
                .eq("user_id", user_id)
                .order("created_at", true),
        )
        .await
    }

    /// One of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist or belongs to someone
    /// else.
    #[instrument(skip(self, credential), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn order_for_user(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, SupabaseError> {
        self.select_one(
            credential,
            "orders",
            &Query::new()
                .select(ORDER_COLUMNS)
                .eq("id", order_id)
                .eq("user_id", user_id),
            format!("order {order_id}"),
        )
        .await
    }

    /// Every order in one of `statuses`, oldest first. Needs the service key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn orders_with_status(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>, SupabaseError> {
        self.select(
            Credential::ServiceRole,
            "orders",
            &Query::new()
                .select(ORDER_ROW_COLUMNS)
                .in_list("status", statuses.iter().map(|s| s.as_str()))
                .order("created_at", false),
        )
        .await
    }
}
