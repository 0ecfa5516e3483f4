//! Author repository.

use sqlx::PgPool;
use tracing::instrument;

use bookstore_core::AuthorId;

use super::RepositoryError;
use crate::models::Author;

/// Repository for author database operations.
pub struct AuthorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All authors ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Author>, RepositoryError> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT id, name, bio, created_at FROM authors ORDER BY LOWER(name)",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(authors)
    }

    /// Authors whose name contains `pattern` (an `ILIKE` pattern).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, pattern: &str) -> Result<Vec<Author>, RepositoryError> {
        let authors = sqlx::query_as::<_, Author>(
            r"
            SELECT id, name, bio, created_at
            FROM authors
            WHERE name ILIKE $1
            ORDER BY LOWER(name)
            LIMIT 50
            ",
        )
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;
        Ok(authors)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AuthorId) -> Result<Option<Author>, RepositoryError> {
        let author = sqlx::query_as::<_, Author>(
            "SELECT id, name, bio, created_at FROM authors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(author)
    }

    /// Insert an author, or return the existing one with the same name
    /// (compared case-insensitively).
    ///
    /// Returns the author and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, bio))]
    pub async fn get_or_create(
        &self,
        name: &str,
        bio: Option<&str>,
    ) -> Result<(Author, bool), RepositoryError> {
        let inserted = sqlx::query_as::<_, Author>(
            r"
            INSERT INTO authors (name, bio)
            VALUES ($1, $2)
            ON CONFLICT ((LOWER(name))) DO NOTHING
            RETURNING id, name, bio, created_at
            ",
        )
        .bind(name)
        .bind(bio)
        .fetch_optional(self.pool)
        .await?;

        if let Some(author) = inserted {
            return Ok((author, true));
        }

        let existing = sqlx::query_as::<_, Author>(
            "SELECT id, name, bio, created_at FROM authors WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok((existing, false))
    }
}
