//! Profile repository.

use sqlx::{PgConnection, PgPool};

use bookstore_core::{OrderId, UserId};

use super::RepositoryError;

/// Repository for profile reads.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Known addresses and order numbers (newest first) for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn get(&self, user_id: UserId) -> Result<(Vec<String>, Vec<String>), RepositoryError> {
        let addresses: Vec<String> =
            sqlx::query_scalar("SELECT addresses FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        let orders: Vec<String> = sqlx::query_scalar(
            r"
            SELECT o.order_number
            FROM profile_orders po
            JOIN profiles p ON p.id = po.profile_id
            JOIN orders o ON o.id = po.order_id
            WHERE p.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok((addresses, orders))
    }
}

/// Append an order to the user's profile and remember the address if new.
///
/// Creates the profile if it is missing.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn record_order(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
    address: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r"
        INSERT INTO profile_orders (profile_id, order_id)
        SELECT id, $2 FROM profiles WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE profiles
        SET addresses = array_append(addresses, $2), updated_at = NOW()
        WHERE user_id = $1 AND NOT ($2 = ANY(addresses))
        ",
    )
    .bind(user_id)
    .bind(address)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
