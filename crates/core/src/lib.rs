//! Choco Bliss Core - Shared types library.
//!
//! This crate provides common types used across all Choco Bliss components:
//! - `storefront` - Public-facing chocolate shop
//! - `cli` - Catalog seeding and order reconciliation
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. Catalog, cart, and order rows live in the managed backend; these
//! types describe them and guard the values we send there.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, order
//!   statuses, and shipping details

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
