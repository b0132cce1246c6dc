//! Managed backend client (REST tables + auth).
//!
//! # Architecture
//!
//! - The backend is the source of truth for catalog, carts, orders, and
//!   profiles. There is NO local database; every read and write is an HTTP
//!   call to the backend's REST endpoint.
//! - Requests made on behalf of a signed-in customer carry that customer's
//!   access token, so the backend's row-level security scopes them. We still
//!   filter by `user_id` explicitly.
//! - Catalog reads are anonymous and cached in memory via `moka`.
//!
//! # Tables
//!
//! `categories`, `products`, `product_variants`, `cart_items`, `orders`,
//! `order_items`, `profiles`.
//!
//! # Example
//!
//! ```rust,ignore
//! use choco_bliss_storefront::supabase::{Credential, SupabaseClient};
//!
//! let client = SupabaseClient::new(&config.supabase, config.catalog_cache_ttl)?;
//!
//! let products = client.list_products(Some("classic-bars")).await?;
//! let session = client.sign_in_with_password(&email, &password).await?;
//! let cart = client
//!     .cart_items(Credential::User(&session.access_token), session.user.id)
//!     .await?;
//! ```

mod auth;
mod cache;
mod cart;
mod catalog;
mod client;
mod orders;
mod profiles;
pub mod query;
mod seed;
pub mod types;

pub use auth::{AuthSession, AuthUser};
pub use client::{Credential, SupabaseClient};
pub use query::Query;
pub use seed::{NewCategory, NewProduct, NewProductVariant};
pub use types::*;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the managed backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error: {status} {}", format_api_error(.code.as_deref(), .message))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access token missing, expired, or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The request was well-formed but not allowed (e.g., variant sold out).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A required credential is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl SupabaseError {
    /// Whether the error means the caller's session is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Error body shapes returned by the REST and auth endpoints.
///
/// REST errors carry `code`/`message`; auth errors use `error`,
/// `error_description`, or `msg` depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    details: Option<String>,
}

impl ApiErrorBody {
    pub(crate) fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.error.clone(),
        }
    }

    pub(crate) fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.msg.clone())
            .or_else(|| self.details.clone())
            .or_else(|| self.error.clone())
    }
}

fn format_api_error(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) if !code.is_empty() => format!("[{code}] {message}"),
        _ => message.to_string(),
    }
}
