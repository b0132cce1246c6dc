//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP with the request's nonce)
//! 5. CSP nonce (generate per-request nonce for the payment script)
//! 6. Session layer (tower-sessions, memory store, signed cookie)
//! 7. Rate limiting on auth, cart, and checkout routes (governor)

pub mod auth;
pub mod csp;
pub mod flash;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_auth_session, set_auth_session};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use flash::{Flashes, push_flash};
pub use rate_limit::{auth_rate_limiter, checkout_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
