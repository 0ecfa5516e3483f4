//! Seed the catalog from a YAML file.
//!
//! ```bash
//! bookstore-cli seed catalog -f crates/cli/seed/catalog.yaml
//! ```
//!
//! Authors are matched by name (case-insensitive). Books are skipped when
//! their ISBN is taken or a book with the same title by the same author
//! already exists, so the command can be re-run safely.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use bookstore_api::services::catalog::{
    BookCache, CatalogError, CatalogService, CreateAuthorInput, CreateBookInput,
};
use bookstore_core::{BookStatus, Genre};

/// Top-level seed document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSeed {
    #[serde(default)]
    pub authors: Vec<AuthorSeed>,
    #[serde(default)]
    pub books: Vec<BookSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorSeed {
    pub name: String,
    pub bio: Option<String>,
}

/// A book, referencing its author by name.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookSeed {
    pub title: String,
    pub author: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub genre: Genre,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    #[serde(default)]
    pub status: BookStatus,
}

/// Counts reported at the end of a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub authors_created: usize,
    pub books_created: usize,
    pub books_skipped: usize,
    pub errors: usize,
}

/// Parse a seed document.
///
/// # Errors
///
/// Returns the YAML error for malformed input or unknown fields.
pub fn parse_catalog(content: &str) -> Result<CatalogSeed, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Seed authors and books from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the database
/// is unreachable. Per-book validation failures are logged and counted.
pub async fn catalog(file_path: &str) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog seed");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse_catalog(&content)?;
    info!(
        authors = seed.authors.len(),
        books = seed.books.len(),
        "Parsed seed file"
    );

    let pool = super::connect().await?;
    let cache = BookCache::new();
    let catalog = CatalogService::new(&pool, &cache);
    let mut summary = SeedSummary::default();

    for author in &seed.authors {
        let input = CreateAuthorInput {
            name: author.name.clone(),
            bio: author.bio.clone(),
        };
        let (_, created) = catalog.create_author(&input).await?;
        if created {
            summary.authors_created += 1;
        }
    }

    for book in seed.books {
        let (author, created) = catalog
            .create_author(&CreateAuthorInput {
                name: book.author.clone(),
                bio: None,
            })
            .await?;
        if created {
            summary.authors_created += 1;
        }

        if already_listed(&catalog, &book.title, &author.name).await? {
            summary.books_skipped += 1;
            continue;
        }

        let title = book.title.clone();
        let input = CreateBookInput {
            title: book.title,
            description: book.description,
            author_id: author.id,
            price: book.price,
            stock: book.stock,
            genre: book.genre,
            isbn: book.isbn,
            image_path: book.image_path,
            status: book.status,
        };

        match catalog.create_book(&input).await {
            Ok(created) => {
                info!(book_id = %created.id, title = %created.title, "Book created");
                summary.books_created += 1;
            }
            Err(CatalogError::IsbnTaken) => {
                warn!(title = %title, "ISBN already in catalog, skipping");
                summary.books_skipped += 1;
            }
            Err(CatalogError::InvalidFields(errors)) => {
                error!(title = %title, "Invalid book: {}", errors.join(", "));
                summary.errors += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Authors created: {}", summary.authors_created);
    info!("  Books created: {}", summary.books_created);
    info!("  Books skipped (already exist): {}", summary.books_skipped);
    if summary.errors > 0 {
        error!("  Invalid books: {}", summary.errors);
    }

    Ok(summary)
}

async fn already_listed(
    catalog: &CatalogService<'_>,
    title: &str,
    author: &str,
) -> Result<bool, CatalogError> {
    if title.trim().is_empty() {
        return Ok(false);
    }
    let matches = catalog.search(title).await?;
    Ok(matches.iter().any(|b| {
        b.title.eq_ignore_ascii_case(title.trim()) && b.author_name.eq_ignore_ascii_case(author)
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let yaml = r"
authors:
  - name: Ursula K. Le Guin
    bio: Author of Earthsea
books:
  - title: A Wizard of Earthsea
    author: Ursula K. Le Guin
    price: 12.50
    stock: 4
    genre: FICTION
    isbn: 978-0-547-77374-3
  - title: Untitled
    author: Anonymous
    price: 3
";
        let seed = parse_catalog(yaml).unwrap();
        assert_eq!(seed.authors.len(), 1);
        assert_eq!(seed.books.len(), 2);

        let first = &seed.books[0];
        assert_eq!(first.price, Decimal::new(1250, 2));
        assert_eq!(first.genre, Genre::Fiction);
        assert_eq!(first.stock, 4);

        let second = &seed.books[1];
        assert_eq!(second.stock, 0);
        assert_eq!(second.genre, Genre::Other);
        assert_eq!(second.status, BookStatus::default());
        assert!(second.isbn.is_none());
    }

    #[test]
    fn test_parse_catalog_rejects_unknown_fields() {
        let yaml = "books:\n  - title: X\n    author: Y\n    price: 1\n    colour: red\n";
        assert!(parse_catalog(yaml).is_err());
    }

    #[test]
    fn test_parse_empty_document() {
        let seed = parse_catalog("{}").unwrap();
        assert!(seed.authors.is_empty());
        assert!(seed.books.is_empty());
    }

    #[test]
    fn test_bundled_seed_file_parses() {
        let content = include_str!("../../seed/catalog.yaml");
        let seed = parse_catalog(content).unwrap();
        assert!(!seed.books.is_empty());
    }
}
