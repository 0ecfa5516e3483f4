//! Stock reports.
//!
//! ```bash
//! bookstore-cli stock low --threshold 3
//! ```

use bookstore_api::db::StockRepository;

/// Log every book with stock strictly below `threshold`.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn low(threshold: i32) -> Result<usize, Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let books = StockRepository::new(&pool).below_threshold(threshold).await?;

    if books.is_empty() {
        tracing::info!("No books below {threshold} copies");
        return Ok(0);
    }

    tracing::info!("Restock these books ({} below {threshold}):", books.len());
    for book in &books {
        tracing::info!(
            "  #{} {} by {}: {} left",
            book.id,
            book.title,
            book.author_name,
            book.stock
        );
    }

    Ok(books.len())
}
