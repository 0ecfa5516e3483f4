//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;
pub mod stock;

use secrecy::SecretString;
use sqlx::PgPool;

/// Load `BOOKSTORE_DATABASE_URL` (or `DATABASE_URL`, after `.env`) and connect.
///
/// # Errors
///
/// Returns an error if the variable is unset or the connection fails.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BOOKSTORE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "BOOKSTORE_DATABASE_URL not set")?;

    tracing::info!("Connecting to database...");
    Ok(bookstore_api::db::create_pool(&database_url).await?)
}
