//! Database migration command.
//!
//! ```bash
//! bookstore-cli migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time.

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
