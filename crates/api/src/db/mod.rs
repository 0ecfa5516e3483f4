//! Database operations for the bookstore `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - Accounts with argon2 password hashes
//! - `authors`, `books` - The catalog
//! - `bags`, `bag_items` - Shopping bags (at most one OPEN bag per user)
//! - `orders`, `order_items` - Snapshots taken at checkout
//! - `profiles`, `profile_orders` - Order history and known addresses
//! - `stock_movements` - Audit log of every stock change
//!
//! Read-only lookups go through the `*Repository` structs, which borrow the
//! pool. Writes that must be atomic with other writes take a
//! `&mut PgConnection` so the caller can run them inside one transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p bookstore-cli -- migrate
//! ```

pub mod authors;
pub mod bags;
pub mod books;
pub mod dashboard;
pub mod orders;
pub mod profiles;
pub mod stock;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use authors::AuthorRepository;
pub use bags::BagRepository;
pub use books::BookRepository;
pub use dashboard::DashboardRepository;
pub use orders::OrderRepository;
pub use profiles::ProfileRepository;
pub use stock::StockRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Convert a stored quantity back to its domain type.
pub(crate) fn quantity_from_row(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity: {value}")))
}

/// Convert a domain quantity for binding.
pub(crate) fn quantity_to_row(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {value} is out of range")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
