//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Sign-in and registration against the backend's auth endpoint
//! - `checkout` - Cart → order → payment → finalization

pub mod auth;
pub mod checkout;

pub use auth::{AuthError, AuthService, Registration};
pub use checkout::{CheckoutError, CheckoutService, PaymentIntent, ReconcileOutcome};
