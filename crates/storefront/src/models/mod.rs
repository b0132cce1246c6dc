//! Domain models for storefront.
//!
//! Backend row types live in [`crate::supabase::types`]; this module holds
//! what the web layer keeps in the session.

pub mod session;

pub use session::{CurrentUser, Flash, FlashKind, keys as session_keys};
