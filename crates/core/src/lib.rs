//! Bookstore Core - Shared domain types.
//!
//! This crate provides the types shared by every bookstore component:
//! - `api` - The REST backend (catalog, cart, checkout, orders, admin)
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure validation logic - no I/O,
//! no database access, no HTTP. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, phones, ISBNs and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
