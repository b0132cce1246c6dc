//! End-to-end tests for the D's Choco Bliss storefront.
//!
//! Every test boots the real storefront router on an ephemeral port, wired
//! to in-process fakes of the managed backend and the payment gateway. No
//! external services or credentials are needed.
//!
//! ```rust,ignore
//! let ctx = TestContext::start().await;
//! let product = ctx.backend.seed_product("classic-bars", "Dark Truffle Bar", &[("100g", "199.00", true)]);
//! ctx.register("Devi Shah", "devi@example.com", "chocolate123").await;
//! let page = ctx.page(&format!("/products/{}", product.product_id)).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fake_razorpay;
pub mod fake_supabase;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use reqwest::{Client, Response, StatusCode, header::LOCATION, redirect::Policy};
use secrecy::SecretString;

use choco_bliss_storefront::config::{
    RazorpayConfig, StoreConfig, StorefrontConfig, SupabaseConfig,
};
use choco_bliss_storefront::razorpay::RazorpayClient;
use choco_bliss_storefront::state::AppState;
use choco_bliss_storefront::supabase::SupabaseClient;

pub use fake_razorpay::FakeRazorpay;
pub use fake_supabase::{FakeSupabase, SeededProduct};

/// A running storefront plus handles to its fakes.
pub struct TestContext {
    /// Storefront base URL, e.g. `http://127.0.0.1:41234`.
    pub base_url: String,
    /// Browser-like client: keeps cookies, does not follow redirects.
    pub client: Client,
    pub backend: FakeSupabase,
    pub gateway: FakeRazorpay,
    backend_url: String,
    gateway_url: String,
}

/// Serve `router` on an ephemeral local port and return its base URL.
///
/// # Panics
///
/// Panics if the port cannot be bound.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    format!("http://{addr}")
}

/// Storefront settings pointing at the given fakes.
#[must_use]
pub fn storefront_config(backend_url: &str, gateway_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("integration-session-secret-".repeat(3)),
        supabase: SupabaseConfig {
            url: backend_url.to_string(),
            anon_key: SecretString::from(fake_supabase::ANON_KEY),
            service_role_key: None,
        },
        razorpay: RazorpayConfig {
            api_base: gateway_url.to_string(),
            key_id: fake_razorpay::KEY_ID.to_string(),
            key_secret: SecretString::from(fake_razorpay::KEY_SECRET),
        },
        store: StoreConfig::default(),
        catalog_cache_ttl: Duration::from_millis(50),
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/static")),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestContext {
    /// Boot both fakes and a storefront wired to them.
    ///
    /// # Panics
    ///
    /// Panics if a server cannot start or the storefront fails to build.
    pub async fn start() -> Self {
        let backend = FakeSupabase::default();
        let gateway = FakeRazorpay::default();
        let backend_url = serve(backend.router()).await;
        let gateway_url = serve(gateway.router()).await;

        let state = AppState::new(storefront_config(&backend_url, &gateway_url))
            .expect("Failed to build app state");
        let app = choco_bliss_storefront::app(state).expect("Failed to build router");
        let base_url = serve(app).await;

        Self {
            base_url,
            client: browser(),
            backend,
            gateway,
            backend_url,
            gateway_url,
        }
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A second browser with its own cookie jar.
    #[must_use]
    pub fn new_browser(&self) -> Client {
        browser()
    }

    /// GET `path`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// POST a form to `path`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// GET `path`, expect 200, and return the body.
    ///
    /// # Panics
    ///
    /// Panics on a non-200 response.
    pub async fn page(&self, path: &str) -> String {
        let response = self.get(path).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.text().await.expect("Failed to read body")
    }

    /// Register through the storefront form and expect to be signed in.
    ///
    /// # Panics
    ///
    /// Panics if registration does not redirect to the product listing.
    pub async fn register(&self, full_name: &str, email: &str, password: &str) {
        let response = self
            .post_form(
                "/auth/register",
                &[
                    ("full_name", full_name),
                    ("email", email),
                    ("password", password),
                ],
            )
            .await;
        assert_eq!(redirect_target(&response), Some("/products"));
    }

    /// Sign in through the storefront form.
    ///
    /// Returns the redirect target.
    pub async fn login(&self, email: &str, password: &str) -> Option<String> {
        let response = self
            .post_form("/auth/login", &[("email", email), ("password", password)])
            .await;
        redirect_target(&response).map(ToString::to_string)
    }

    /// Backend client holding the service key, as the CLI builds it.
    ///
    /// # Panics
    ///
    /// Panics if the client fails to build.
    #[must_use]
    pub fn service_client(&self) -> SupabaseClient {
        SupabaseClient::new(
            &SupabaseConfig {
                url: self.backend_url.clone(),
                anon_key: SecretString::from(fake_supabase::ANON_KEY),
                service_role_key: Some(SecretString::from(fake_supabase::SERVICE_KEY)),
            },
            Duration::from_millis(50),
        )
        .expect("Failed to build backend client")
    }

    /// Gateway client with the fake's credentials.
    ///
    /// # Panics
    ///
    /// Panics if the client fails to build.
    #[must_use]
    pub fn gateway_client(&self) -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            api_base: self.gateway_url.clone(),
            key_id: fake_razorpay::KEY_ID.to_string(),
            key_secret: SecretString::from(fake_razorpay::KEY_SECRET),
        })
        .expect("Failed to build gateway client")
    }
}

fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// `Location` of a 303 response, if that is what `response` is.
#[must_use]
pub fn redirect_target(response: &Response) -> Option<&str> {
    if response.status() != StatusCode::SEE_OTHER {
        return None;
    }
    response.headers().get(LOCATION)?.to_str().ok()
}
