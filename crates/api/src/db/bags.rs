//! Shopping bag persistence.
//!
//! Every mutating function here expects to run inside a transaction that
//! already holds the bag's row lock (see [`lock_or_open`]).

use sqlx::{PgConnection, PgPool};

use bookstore_core::{BagId, BagItemId, BagStatus, BookId, BookStatus, Price, UserId};

use super::{RepositoryError, quantity_from_row, quantity_to_row};
use crate::models::BagLine;

#[derive(sqlx::FromRow)]
struct BagLineRow {
    item_id: BagItemId,
    book_id: BookId,
    title: String,
    unit_price: Price,
    quantity: i32,
    stock: i32,
    status: BookStatus,
}

impl TryFrom<BagLineRow> for BagLine {
    type Error = RepositoryError;

    fn try_from(row: BagLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            item_id: row.item_id,
            book_id: row.book_id,
            title: row.title,
            unit_price: row.unit_price,
            quantity: quantity_from_row(row.quantity)?,
            stock: row.stock,
            status: row.status,
        })
    }
}

const LINES_QUERY: &str = r"
    SELECT i.id AS item_id, i.book_id, b.title, b.price AS unit_price,
           i.quantity, b.stock, b.status
    FROM bag_items i
    JOIN books b ON b.id = i.book_id
    WHERE i.bag_id = $1
    ORDER BY i.id
";

/// Read-only access to bags.
pub struct BagRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BagRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's OPEN bag id, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_bag(&self, user_id: UserId) -> Result<Option<BagId>, RepositoryError> {
        let id = sqlx::query_scalar("SELECT id FROM bags WHERE user_id = $1 AND status = $2")
            .bind(user_id)
            .bind(BagStatus::Open)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// Lines of a bag with live book data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, bag_id: BagId) -> Result<Vec<BagLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, BagLineRow>(LINES_QUERY)
            .bind(bag_id)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(BagLine::try_from).collect()
    }
}

/// Lock the user's OPEN bag, creating one first if they have none.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn lock_or_open(conn: &mut PgConnection, user_id: UserId) -> Result<BagId, RepositoryError> {
    if let Some(id) = lock_open(conn, user_id).await? {
        return Ok(id);
    }

    sqlx::query(
        r"
        INSERT INTO bags (user_id) VALUES ($1)
        ON CONFLICT (user_id) WHERE status = 'OPEN' DO NOTHING
        ",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    lock_open(conn, user_id)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Lock the user's OPEN bag if one exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_open(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<BagId>, RepositoryError> {
    let id = sqlx::query_scalar(
        "SELECT id FROM bags WHERE user_id = $1 AND status = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(BagStatus::Open)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

/// Lines of a bag, read on the transaction's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(conn: &mut PgConnection, bag_id: BagId) -> Result<Vec<BagLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, BagLineRow>(LINES_QUERY)
        .bind(bag_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(BagLine::try_from).collect()
}

/// Insert or overwrite the quantity of a book in the bag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn set_quantity(
    conn: &mut PgConnection,
    bag_id: BagId,
    book_id: BookId,
    quantity: u32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO bag_items (bag_id, book_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (bag_id, book_id) DO UPDATE SET quantity = EXCLUDED.quantity
        ",
    )
    .bind(bag_id)
    .bind(book_id)
    .bind(quantity_to_row(quantity)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drop a book's line from the bag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn remove_book(
    conn: &mut PgConnection,
    bag_id: BagId,
    book_id: BookId,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM bag_items WHERE bag_id = $1 AND book_id = $2")
        .bind(bag_id)
        .bind(book_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Drop a line by its item id. Returns `false` if the item is not in this bag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn remove_item(
    conn: &mut PgConnection,
    bag_id: BagId,
    item_id: BagItemId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM bag_items WHERE bag_id = $1 AND id = $2")
        .bind(bag_id)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every line from the bag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn clear(conn: &mut PgConnection, bag_id: BagId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM bag_items WHERE bag_id = $1")
        .bind(bag_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Store the recomputed total.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn store_total(
    conn: &mut PgConnection,
    bag_id: BagId,
    total: Price,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE bags SET total = $2, updated_at = NOW() WHERE id = $1")
        .bind(bag_id)
        .bind(total)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Close the bag and open a fresh, empty one for the same user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn rotate(
    conn: &mut PgConnection,
    bag_id: BagId,
    user_id: UserId,
) -> Result<BagId, RepositoryError> {
    sqlx::query("UPDATE bags SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(bag_id)
        .bind(BagStatus::Closed)
        .execute(&mut *conn)
        .await?;

    let new_id = sqlx::query_scalar("INSERT INTO bags (user_id) VALUES ($1) RETURNING id")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(new_id)
}
