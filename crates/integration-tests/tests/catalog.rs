//! Public catalog pages and health checks.

use reqwest::StatusCode;
use serde_json::json;

use choco_bliss_integration_tests::TestContext;

#[tokio::test]
async fn test_home_lists_collections() {
    let ctx = TestContext::start().await;
    ctx.backend
        .seed_product("kunafa-special", "Pistachio Kunafa Bar", &[("100g", "249.00", true)]);
    ctx.backend
        .seed_product("classic-bars", "Classic Milk Bar", &[("50g", "99.00", true)]);

    let home = ctx.page("/").await;
    assert!(home.contains("Our Collections"));
    assert!(home.contains("/products?category=kunafa-special"));
    assert!(home.contains("/products?category=classic-bars"));
}

#[tokio::test]
async fn test_listing_filters_by_category() {
    let ctx = TestContext::start().await;
    ctx.backend
        .seed_product("kunafa-special", "Pistachio Kunafa Bar", &[("100g", "249.00", true)]);
    ctx.backend
        .seed_product("classic-bars", "Classic Milk Bar", &[("50g", "99.00", true)]);

    let all = ctx.page("/products").await;
    assert!(all.contains("Our Chocolates"));
    assert!(all.contains("Pistachio Kunafa Bar"));
    assert!(all.contains("Classic Milk Bar"));

    let kunafa = ctx.page("/products?category=kunafa-special").await;
    assert!(kunafa.contains("Pistachio Kunafa Bar"));
    assert!(!kunafa.contains("Classic Milk Bar"));

    // Unknown slugs fall back to the full listing
    let unknown = ctx.page("/products?category=no-such-thing").await;
    assert!(unknown.contains("Our Chocolates"));
    assert!(unknown.contains("Classic Milk Bar"));
}

#[tokio::test]
async fn test_inactive_products_are_hidden() {
    let ctx = TestContext::start().await;
    let hidden = ctx
        .backend
        .seed_product("premium-collection", "Truffle Box", &[("Box of 12", "999.00", true)]);
    ctx.backend
        .set_column("products", &hidden.product_id, "is_active", json!(false));

    assert!(!ctx.page("/products").await.contains("Truffle Box"));
    let response = ctx.get(&format!("/products/{}", hidden.product_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_page_shows_variants() {
    let ctx = TestContext::start().await;
    let product = ctx.backend.seed_product(
        "signature-blends",
        "Coffee Caramel Bar",
        &[("100g", "239.00", true), ("Gift box of 3", "699.00", false)],
    );

    let page = ctx.page(&format!("/products/{}", product.product_id)).await;
    assert!(page.contains("Coffee Caramel Bar"));
    assert!(page.contains("₹239.00"));
    assert!(page.contains("Gift box of 3"));
    assert!(page.contains("Unavailable"));
    assert!(page.contains(&product.variant_ids[0]));
    assert!(!page.contains(&product.variant_ids[1]));
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::start().await;

    let response = ctx.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let response = ctx.get("/health/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
}
