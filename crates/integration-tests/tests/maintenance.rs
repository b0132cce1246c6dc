//! Service-key operations used by the CLI: catalog seeding and order
//! reconciliation.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use choco_bliss_core::OrderStatus;
use choco_bliss_integration_tests::{
    SeededProduct, TestContext, redirect_target, storefront_config,
};
use choco_bliss_storefront::services::{CheckoutService, ReconcileOutcome};
use choco_bliss_storefront::supabase::{
    NewCategory, NewProduct, NewProductVariant, Order, SupabaseClient, SupabaseError,
};

/// A customer who has opened the payment widget for one bar.
async fn pending_checkout(ctx: &TestContext, product: &SeededProduct) -> String {
    ctx.register("Devi Shah", "devi@example.com", "chocolate123")
        .await;
    let response = ctx
        .post_form(
            "/cart/add",
            &[
                ("product_id", product.product_id.as_str()),
                ("variant_id", product.variant_ids[0].as_str()),
            ],
        )
        .await;
    assert!(redirect_target(&response).is_some());

    let response = ctx
        .post_form(
            "/checkout",
            &[
                ("name", "Devi Shah"),
                ("phone", "9023974421"),
                ("address", "12 MG Road"),
                ("city", "Ahmedabad"),
                ("state", "Gujarat"),
                ("pincode", "380001"),
            ],
        )
        .await;
    assert!(response.status().is_success());

    ctx.backend.rows("orders")[0]["razorpay_order_id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn open_orders(ctx: &TestContext) -> Vec<Order> {
    ctx.service_client()
        .orders_with_status(&[OrderStatus::Pending, OrderStatus::Failed])
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reconcile_settles_captured_payment() {
    let ctx = TestContext::start().await;
    let product = ctx
        .backend
        .seed_product("classic-bars", "Classic Dark Bar", &[("100g", "199.00", true)]);
    let gateway_order = pending_checkout(&ctx, &product).await;
    ctx.gateway.record_payment(&gateway_order, "pay_failed", "failed");
    ctx.gateway.record_payment(&gateway_order, "pay_ok", "captured");

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let checkout = CheckoutService::new(&supabase, &razorpay);

    let orders = open_orders(&ctx).await;
    assert_eq!(orders.len(), 1);
    let outcome = checkout
        .reconcile(&orders[0], Duration::minutes(30), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Paid {
            payment_id: "pay_ok".to_string()
        }
    );

    let stored = &ctx.backend.rows("orders")[0];
    assert_eq!(stored["status"], "paid");
    assert_eq!(stored["razorpay_payment_id"], "pay_ok");
    assert!(open_orders(&ctx).await.is_empty());
}

#[tokio::test]
async fn test_reconcile_fails_only_stale_orders() {
    let ctx = TestContext::start().await;
    let product = ctx
        .backend
        .seed_product("classic-bars", "Classic Dark Bar", &[("100g", "199.00", true)]);
    pending_checkout(&ctx, &product).await;

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let checkout = CheckoutService::new(&supabase, &razorpay);
    let order = open_orders(&ctx).await.remove(0);

    let fresh = checkout
        .reconcile(&order, Duration::minutes(30), order.created_at + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(fresh, ReconcileOutcome::Unchanged);
    assert_eq!(ctx.backend.rows("orders")[0]["status"], "pending");

    let stale = checkout
        .reconcile(&order, Duration::minutes(30), order.created_at + Duration::minutes(31))
        .await
        .unwrap();
    assert_eq!(stale, ReconcileOutcome::Failed);
    assert_eq!(ctx.backend.rows("orders")[0]["status"], "failed");
}

#[tokio::test]
async fn test_late_payment_revives_failed_order() {
    let ctx = TestContext::start().await;
    let product = ctx
        .backend
        .seed_product("classic-bars", "Classic Dark Bar", &[("100g", "199.00", true)]);
    let gateway_order = pending_checkout(&ctx, &product).await;

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let checkout = CheckoutService::new(&supabase, &razorpay);

    let order = open_orders(&ctx).await.remove(0);
    let later = order.created_at + Duration::hours(2);
    assert_eq!(
        checkout
            .reconcile(&order, Duration::minutes(30), later)
            .await
            .unwrap(),
        ReconcileOutcome::Failed
    );

    ctx.gateway.record_payment(&gateway_order, "pay_late", "authorized");
    let order = open_orders(&ctx).await.remove(0);
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(matches!(
        checkout
            .reconcile(&order, Duration::minutes(30), later)
            .await
            .unwrap(),
        ReconcileOutcome::Paid { .. }
    ));
    assert_eq!(ctx.backend.rows("orders")[0]["status"], "paid");
}

#[tokio::test]
async fn test_payment_after_cancel_is_reported() {
    let ctx = TestContext::start().await;
    let product = ctx
        .backend
        .seed_product("classic-bars", "Classic Dark Bar", &[("100g", "199.00", true)]);
    let gateway_order = pending_checkout(&ctx, &product).await;
    let order_id = ctx.backend.rows("orders")[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = ctx
        .post_form("/checkout/cancel", &[("order_id", order_id.as_str())])
        .await;
    assert_eq!(redirect_target(&response), Some("/checkout"));

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let checkout = CheckoutService::new(&supabase, &razorpay);
    let order = supabase
        .orders_with_status(&[OrderStatus::Cancelled])
        .await
        .unwrap()
        .remove(0);

    assert_eq!(
        checkout
            .reconcile(&order, Duration::minutes(30), Utc::now())
            .await
            .unwrap(),
        ReconcileOutcome::Unchanged
    );

    ctx.gateway.record_payment(&gateway_order, "pay_after_close", "captured");
    assert_eq!(
        checkout
            .reconcile(&order, Duration::minutes(30), Utc::now())
            .await
            .unwrap(),
        ReconcileOutcome::PaidAfterCancel {
            payment_id: "pay_after_close".to_string()
        }
    );
    // Cancelled is final; the payment is reported, not applied
    let stored = &ctx.backend.rows("orders")[0];
    assert_eq!(stored["status"], "cancelled");
    assert!(stored["razorpay_payment_id"].is_null());
}

#[tokio::test]
async fn test_seeding_skips_existing_categories() {
    let ctx = TestContext::start().await;
    let client = ctx.service_client();

    let categories = vec![
        NewCategory {
            name: "Kunafa Special".to_string(),
            slug: "kunafa-special".to_string(),
            description: Some("Exotic Middle Eastern fusion".to_string()),
        },
        NewCategory {
            name: "Classic Bars".to_string(),
            slug: "classic-bars".to_string(),
            description: Some("Timeless chocolate perfection".to_string()),
        },
    ];

    let inserted = client.seed_categories(&categories).await.unwrap();
    assert_eq!(inserted.len(), 2);
    assert!(client.seed_categories(&categories).await.unwrap().is_empty());
    assert_eq!(ctx.backend.rows("categories").len(), 2);

    let products = client
        .seed_products(&[NewProduct {
            name: "Pistachio Kunafa Bar".to_string(),
            description: None,
            base_price: Decimal::new(29_900, 2),
            image_url: None,
            category_id: inserted[0].id,
            is_active: true,
        }])
        .await
        .unwrap();
    let variants = client
        .seed_variants(&[NewProductVariant {
            product_id: products[0].id,
            variant_name: "100g".to_string(),
            price: Decimal::new(29_900, 2),
            is_available: true,
        }])
        .await
        .unwrap();
    assert_eq!(variants.len(), 1);

    let listing = ctx.page("/products?category=kunafa-special").await;
    assert!(listing.contains("Pistachio Kunafa Bar"));
}

#[tokio::test]
async fn test_catalog_writes_need_the_service_key() {
    let ctx = TestContext::start().await;

    // Same settings the storefront runs with: anon key only
    let config = storefront_config(&ctx.base_url, &ctx.base_url);
    let anon_only = SupabaseClient::new(&config.supabase, StdDuration::from_secs(1)).unwrap();

    let err = anon_only
        .seed_categories(&[NewCategory {
            name: "Special Bars".to_string(),
            slug: "special-bars".to_string(),
            description: None,
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, SupabaseError::MissingCredential(_)));
    assert!(ctx.backend.rows("categories").is_empty());
}
