//! Cart and checkout flows through the storefront, end to end.

use reqwest::StatusCode;
use serde_json::Value;

use choco_bliss_core::{OrderId, OrderStatus};
use choco_bliss_integration_tests::{
    SeededProduct, TestContext, fake_razorpay, redirect_target,
};
use choco_bliss_storefront::razorpay::{PaymentCallback, sign_payment};
use choco_bliss_storefront::services::{CheckoutError, CheckoutService};

const SHIPPING: &[(&str, &str)] = &[
    ("name", "Devi Shah"),
    ("phone", "+91 90239 74421"),
    ("address", "12 MG Road"),
    ("city", "Ahmedabad"),
    ("state", "Gujarat"),
    ("pincode", "380001"),
];

/// A signed-in customer with a seeded product.
async fn shopper() -> (TestContext, SeededProduct) {
    let ctx = TestContext::start().await;
    let product = ctx.backend.seed_product(
        "kunafa-special",
        "Pistachio Kunafa Bar",
        &[("100g", "249.00", true), ("200g", "449.00", false)],
    );
    ctx.register("Devi Shah", "devi@example.com", "chocolate123")
        .await;
    (ctx, product)
}

async fn add_to_cart(ctx: &TestContext, product: &SeededProduct, variant: usize) -> String {
    let response = ctx
        .post_form(
            "/cart/add",
            &[
                ("product_id", product.product_id.as_str()),
                ("variant_id", product.variant_ids[variant].as_str()),
            ],
        )
        .await;
    redirect_target(&response)
        .expect("add to cart redirects")
        .to_string()
}

/// Submit the shipping form and return the new order row.
async fn begin_checkout(ctx: &TestContext) -> Value {
    let response = ctx.post_form("/checkout", SHIPPING).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Complete your payment"));

    let orders = ctx.backend.rows("orders");
    assert_eq!(orders.len(), 1);
    let order = orders[0].clone();
    let gateway_order = order["razorpay_order_id"].as_str().unwrap();
    assert!(body.contains(gateway_order));
    order
}

fn str_field<'a>(row: &'a Value, key: &str) -> &'a str {
    row[key].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_add_to_cart_increments_existing_line() {
    let (ctx, product) = shopper().await;

    let target = add_to_cart(&ctx, &product, 0).await;
    assert_eq!(target, format!("/products/{}", product.product_id));
    let page = ctx.page(&target).await;
    assert!(page.contains("Added to cart!"));

    add_to_cart(&ctx, &product, 0).await;

    let lines = ctx.backend.rows("cart_items");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 2);

    let cart = ctx.page("/cart").await;
    assert!(cart.contains("Pistachio Kunafa Bar"));
    assert!(cart.contains("₹498.00"));
}

#[tokio::test]
async fn test_unavailable_variant_is_rejected() {
    let (ctx, product) = shopper().await;

    let target = add_to_cart(&ctx, &product, 1).await;
    let page = ctx.page(&target).await;
    assert!(page.contains("That option is not available right now"));
    assert!(ctx.backend.rows("cart_items").is_empty());
}

#[tokio::test]
async fn test_cart_quantity_update_and_remove() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    let item_id = str_field(&ctx.backend.rows("cart_items")[0], "id").to_string();

    let response = ctx
        .post_form("/cart/update", &[("item_id", &item_id), ("quantity", "5")])
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert_eq!(ctx.backend.rows("cart_items")[0]["quantity"], 5);

    // Zero is ignored rather than deleting the line
    ctx.post_form("/cart/update", &[("item_id", &item_id), ("quantity", "0")])
        .await;
    assert_eq!(ctx.backend.rows("cart_items")[0]["quantity"], 5);

    let response = ctx
        .post_form("/cart/remove", &[("item_id", &item_id)])
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert!(ctx.backend.rows("cart_items").is_empty());
    assert!(ctx.page("/cart").await.contains("Item removed from cart"));
}

#[tokio::test]
async fn test_cart_quantity_is_capped() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    let item_id = str_field(&ctx.backend.rows("cart_items")[0], "id").to_string();

    let response = ctx
        .post_form(
            "/cart/update",
            &[("item_id", &item_id), ("quantity", "2147483647")],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert_eq!(ctx.backend.rows("cart_items")[0]["quantity"], 99);

    // Adding again keeps the line at the cap
    add_to_cart(&ctx, &product, 0).await;
    assert_eq!(ctx.backend.rows("cart_items")[0]["quantity"], 99);
    assert!(ctx.page("/cart").await.contains("Pistachio Kunafa Bar"));
}

#[tokio::test]
async fn test_checkout_and_verified_payment() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    add_to_cart(&ctx, &product, 0).await;

    let checkout = ctx.page("/checkout").await;
    assert!(checkout.contains("Devi Shah"));

    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id");
    let gateway_order = str_field(&order, "razorpay_order_id");
    assert_eq!(str_field(&order, "status"), "pending");
    assert_eq!(str_field(&order, "total_amount"), "498.00");
    assert_eq!(str_field(&order, "shipping_phone"), "9023974421");

    let items = ctx.backend.rows_where("order_items", "order_id", order_id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(str_field(&items[0], "variant_name"), "100g");

    let gateway_orders = ctx.gateway.orders();
    assert_eq!(gateway_orders[0]["amount"], 49_800);
    assert_eq!(gateway_orders[0]["receipt"], order_id);

    let signature = sign_payment(
        fake_razorpay::KEY_SECRET.as_bytes(),
        gateway_order,
        "pay_0001",
    );
    let response = ctx
        .post_form(
            "/checkout/verify",
            &[
                ("order_id", order_id),
                ("razorpay_order_id", gateway_order),
                ("razorpay_payment_id", "pay_0001"),
                ("razorpay_signature", &signature),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/account"));

    let paid = &ctx.backend.rows_where("orders", "id", order_id)[0];
    assert_eq!(str_field(paid, "status"), "paid");
    assert_eq!(str_field(paid, "razorpay_payment_id"), "pay_0001");
    assert!(ctx.backend.rows("cart_items").is_empty());

    let account = ctx.page("/account").await;
    assert!(account.contains("Payment successful! Order placed."));
    assert!(account.contains("Pistachio Kunafa Bar"));
    assert!(account.contains("₹498.00"));

    // A replayed callback is accepted without changing anything
    let response = ctx
        .post_form(
            "/checkout/verify",
            &[
                ("order_id", order_id),
                ("razorpay_order_id", gateway_order),
                ("razorpay_payment_id", "pay_0001"),
                ("razorpay_signature", &signature),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/account"));
}

#[tokio::test]
async fn test_forged_signature_leaves_order_pending() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;

    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id");
    let gateway_order = str_field(&order, "razorpay_order_id");

    let forged = sign_payment(b"not-the-secret", gateway_order, "pay_0002");
    let response = ctx
        .post_form(
            "/checkout/verify",
            &[
                ("order_id", order_id),
                ("razorpay_order_id", gateway_order),
                ("razorpay_payment_id", "pay_0002"),
                ("razorpay_signature", &forged),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));

    let stored = &ctx.backend.rows_where("orders", "id", order_id)[0];
    assert_eq!(str_field(stored, "status"), "pending");
    assert_eq!(ctx.backend.rows("cart_items").len(), 1);
    assert!(ctx.page("/cart").await.contains("Payment verification failed"));
}

#[tokio::test]
async fn test_dismissed_widget_cancels_order() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;

    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id");

    let response = ctx
        .post_form("/checkout/cancel", &[("order_id", order_id)])
        .await;
    assert_eq!(redirect_target(&response), Some("/checkout"));

    let stored = &ctx.backend.rows_where("orders", "id", order_id)[0];
    assert_eq!(str_field(stored, "status"), "cancelled");
    assert_eq!(ctx.backend.rows("cart_items").len(), 1);

    // The shipping draft survives the round trip
    let checkout = ctx.page("/checkout").await;
    assert!(checkout.contains("Payment cancelled"));
    assert!(checkout.contains("12 MG Road"));
}

#[tokio::test]
async fn test_gateway_refusal_marks_order_failed() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    ctx.gateway.refuse_orders(true);

    let response = ctx.post_form("/checkout", SHIPPING).await;
    assert_eq!(redirect_target(&response), Some("/checkout"));

    let orders = ctx.backend.rows("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(str_field(&orders[0], "status"), "failed");
    assert_eq!(ctx.backend.rows("cart_items").len(), 1);
    assert!(
        ctx.page("/checkout")
            .await
            .contains("Failed to initialize payment")
    );
}

#[tokio::test]
async fn test_invalid_shipping_creates_no_order() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;

    let response = ctx
        .post_form(
            "/checkout",
            &[
                ("name", "Devi Shah"),
                ("phone", "12345"),
                ("address", "12 MG Road"),
                ("city", "Ahmedabad"),
                ("state", "Gujarat"),
                ("pincode", "380001"),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/checkout"));
    assert!(ctx.backend.rows("orders").is_empty());
    assert!(ctx.gateway.orders().is_empty());
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let (ctx, _) = shopper().await;

    let response = ctx.get("/checkout").await;
    assert_eq!(redirect_target(&response), Some("/cart"));

    let response = ctx.post_form("/checkout", SHIPPING).await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert!(ctx.backend.rows("orders").is_empty());
    assert!(ctx.page("/cart").await.contains("Your cart is empty"));
}

#[tokio::test]
async fn test_anonymous_visitor_is_sent_to_login() {
    let ctx = TestContext::start().await;
    let product = ctx
        .backend
        .seed_product("classic-bars", "Classic Milk Bar", &[("50g", "99.00", true)]);

    let target = add_to_cart(&ctx, &product, 0).await;
    assert_eq!(target, "/auth/login");
    assert!(
        ctx.page(&target)
            .await
            .contains("Please login to add items to cart")
    );

    for path in ["/cart", "/checkout", "/account"] {
        let response = ctx.get(path).await;
        assert_eq!(redirect_target(&response), Some("/auth/login"), "{path}");
    }
}

#[tokio::test]
async fn test_customers_cannot_touch_each_others_orders() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id").to_string();

    let intruder = ctx.new_browser();
    let response = intruder
        .post(ctx.url("/auth/register"))
        .form(&[
            ("full_name", "Ravi Patel"),
            ("email", "ravi@example.com"),
            ("password", "chocolate456"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(redirect_target(&response), Some("/products"));

    let response = intruder
        .post(ctx.url("/checkout/cancel"))
        .form(&[("order_id", order_id.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let stored = &ctx.backend.rows_where("orders", "id", &order_id)[0];
    assert_eq!(str_field(stored, "status"), "pending");
}

/// A correctly signed success callback for `gateway_order`.
fn signed_callback(gateway_order: &str, payment_id: &str) -> PaymentCallback {
    PaymentCallback {
        razorpay_order_id: gateway_order.to_string(),
        razorpay_payment_id: payment_id.to_string(),
        razorpay_signature: sign_payment(
            fake_razorpay::KEY_SECRET.as_bytes(),
            gateway_order,
            payment_id,
        ),
    }
}

#[tokio::test]
async fn test_callback_for_another_gateway_order_is_rejected() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id").to_string();

    // Signed with the real secret, but for an order we never created
    let callback = signed_callback("order_someone_else", "pay_0003");

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let session = supabase
        .sign_in_with_password("devi@example.com", "chocolate123")
        .await
        .unwrap();
    let err = CheckoutService::new(&supabase, &razorpay)
        .complete(&session, order_id.parse::<OrderId>().unwrap(), &callback)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::GatewayMismatch(_)));

    let response = ctx
        .post_form(
            "/checkout/verify",
            &[
                ("order_id", order_id.as_str()),
                ("razorpay_order_id", callback.razorpay_order_id.as_str()),
                ("razorpay_payment_id", callback.razorpay_payment_id.as_str()),
                ("razorpay_signature", callback.razorpay_signature.as_str()),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert!(ctx.page("/cart").await.contains("Payment verification failed"));

    let stored = &ctx.backend.rows_where("orders", "id", &order_id)[0];
    assert_eq!(str_field(stored, "status"), "pending");
    assert!(stored["razorpay_payment_id"].is_null());
    assert_eq!(ctx.backend.rows("cart_items").len(), 1);
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_completed() {
    let (ctx, product) = shopper().await;
    add_to_cart(&ctx, &product, 0).await;
    let order = begin_checkout(&ctx).await;
    let order_id = str_field(&order, "id").to_string();
    let gateway_order = str_field(&order, "razorpay_order_id").to_string();

    let response = ctx
        .post_form("/checkout/cancel", &[("order_id", order_id.as_str())])
        .await;
    assert_eq!(redirect_target(&response), Some("/checkout"));

    let callback = signed_callback(&gateway_order, "pay_0004");

    let supabase = ctx.service_client();
    let razorpay = ctx.gateway_client();
    let session = supabase
        .sign_in_with_password("devi@example.com", "chocolate123")
        .await
        .unwrap();
    let err = CheckoutService::new(&supabase, &razorpay)
        .complete(&session, order_id.parse::<OrderId>().unwrap(), &callback)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InvalidState(OrderStatus::Cancelled)
    ));

    let response = ctx
        .post_form(
            "/checkout/verify",
            &[
                ("order_id", order_id.as_str()),
                ("razorpay_order_id", callback.razorpay_order_id.as_str()),
                ("razorpay_payment_id", callback.razorpay_payment_id.as_str()),
                ("razorpay_signature", callback.razorpay_signature.as_str()),
            ],
        )
        .await;
    assert_eq!(redirect_target(&response), Some("/cart"));
    assert!(
        ctx.page("/cart")
            .await
            .contains("This order can no longer be paid")
    );

    let stored = &ctx.backend.rows_where("orders", "id", &order_id)[0];
    assert_eq!(str_field(stored, "status"), "cancelled");
    assert!(stored["razorpay_payment_id"].is_null());
    assert_eq!(ctx.backend.rows("cart_items").len(), 1);
}
