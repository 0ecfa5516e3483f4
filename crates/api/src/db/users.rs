//! User repository for database operations.

use sqlx::PgPool;

use bookstore_core::{Email, Phone, UserId, UserRole};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

const USER_COLUMNS: &str =
    "id, name, phone, email, role, status, created_at, updated_at";

/// Fields needed to create a user account.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub phone: Option<&'a Phone>,
    pub password_hash: &'a str,
    pub role: UserRole,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a user together with their stored password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: User,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, Row>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// Create a user along with their profile and an empty OPEN bag.
    ///
    /// All three rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users (name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.password_hash)
        .bind(new.role)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "user"))?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO bags (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }
}
