//! Domain models for the bookstore API.
//!
//! These are validated domain objects, serialized to clients in camelCase.
//! Database row types that need conversion live next to their queries in
//! [`crate::db`].

pub mod bag;
pub mod catalog;
pub mod order;
pub mod page;
pub mod profile;
pub mod stock;
pub mod user;

pub use bag::{BagItemView, BagLine, BagView};
pub use catalog::{Author, Book};
pub use order::{Order, OrderItem, OrderSummary};
pub use page::Page;
pub use profile::Profile;
pub use stock::{DashboardStats, LowStockBook, StockMovement};
pub use user::{CurrentUser, User};
