//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Signup, login and the current user
//! - `token` - Signed access tokens
//! - `cart` - Mutations of the OPEN bag
//! - `checkout` - Bag to order conversion
//! - `orders` - Order history, cancellation and status changes
//! - `catalog` - Books, authors and stock adjustments
//! - `inventory` - Background low-stock watcher

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod token;
