//! Shopping bag mutations.
//!
//! Each mutation runs in one transaction that holds the user's OPEN bag row
//! lock, so concurrent requests on the same bag apply one after another. The
//! bag total is recomputed from live book prices after every change.
//!
//! The quantity rules are pure functions ([`plan_add`], [`plan_remove`],
//! [`merge_edit`]) so they can be tested without a database.

use std::collections::BTreeMap;

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{debug, instrument};

use bookstore_core::{BagId, BagItemId, BookId, BookStatus, Price, UserId};

use crate::db::stock::{LockedBook, lock_books};
use crate::db::{BagRepository, RepositoryError, bags};
use crate::models::{BagLine, BagView};

/// Errors from bag mutations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("book {0} not found")]
    BookNotFound(BookId),

    #[error("\"{0}\" is not available for sale")]
    BookInactive(String),

    #[error("Stock not enough for \"{title}\": {available} available, {requested} requested")]
    InsufficientStock {
        title: String,
        available: i32,
        requested: u32,
    },

    #[error("No books found in the bag")]
    EmptyBag,

    #[error("book {0} is not in the bag")]
    NotInBag(BookId),

    #[error("cannot remove {requested} of \"{title}\": only {present} in the bag")]
    RemoveExceedsQuantity {
        title: String,
        present: u32,
        requested: u32,
    },

    #[error("bag item {0} not found")]
    ItemNotFound(BagItemId),

    #[error("Bag total cannot exceed {}", Price::MAX_TOTAL.amount())]
    TotalTooLarge,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Body of add/remove requests.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagDelta {
    #[serde(alias = "book_id")]
    pub book_id: BookId,
    pub quantity: u32,
}

/// One entry of an overwrite request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditItem {
    pub book_id: BookId,
    pub quantity: u32,
}

/// Result of removing copies of a book from a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Keep the line with this quantity.
    Keep(u32),
    /// Remove the line.
    Drop,
}

fn has_stock(stock: i32, wanted: u32) -> bool {
    i64::from(stock) >= i64::from(wanted)
}

/// New quantity of a line after adding `requested` copies of `book`.
///
/// # Errors
///
/// Rejects a zero quantity, an INACTIVE book, and totals above current stock.
pub fn plan_add(book: &LockedBook, existing: Option<u32>, requested: u32) -> Result<u32, CartError> {
    if requested == 0 {
        return Err(CartError::InvalidQuantity);
    }
    if book.status != BookStatus::Active {
        return Err(CartError::BookInactive(book.title.clone()));
    }

    let wanted = existing
        .unwrap_or(0)
        .checked_add(requested)
        .ok_or(CartError::InvalidQuantity)?;

    if !has_stock(book.stock, wanted) {
        return Err(CartError::InsufficientStock {
            title: book.title.clone(),
            available: book.stock,
            requested: wanted,
        });
    }
    Ok(wanted)
}

/// Outcome of removing `requested` copies of `book_id` from `lines`.
///
/// # Errors
///
/// Rejects a zero quantity, an empty bag, a book not in the bag, and removing
/// more copies than the line holds.
pub fn plan_remove(
    lines: &[BagLine],
    book_id: BookId,
    requested: u32,
) -> Result<RemoveOutcome, CartError> {
    if requested == 0 {
        return Err(CartError::InvalidQuantity);
    }
    if lines.is_empty() {
        return Err(CartError::EmptyBag);
    }
    let line = lines
        .iter()
        .find(|l| l.book_id == book_id)
        .ok_or(CartError::NotInBag(book_id))?;

    match line.quantity.checked_sub(requested) {
        None => Err(CartError::RemoveExceedsQuantity {
            title: line.title.clone(),
            present: line.quantity,
            requested,
        }),
        Some(0) => Ok(RemoveOutcome::Drop),
        Some(left) => Ok(RemoveOutcome::Keep(left)),
    }
}

/// Merge duplicate books in an overwrite request.
///
/// # Errors
///
/// Rejects zero quantities.
pub fn merge_edit(items: &[EditItem]) -> Result<BTreeMap<BookId, u32>, CartError> {
    let mut merged = BTreeMap::new();
    for item in items {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let entry = merged.entry(item.book_id).or_insert(0_u32);
        *entry = entry
            .checked_add(item.quantity)
            .ok_or(CartError::InvalidQuantity)?;
    }
    Ok(merged)
}

/// Check a merged overwrite request against locked books.
///
/// # Errors
///
/// Returns the first missing, inactive or under-stocked book.
pub fn check_edit(merged: &BTreeMap<BookId, u32>, books: &[LockedBook]) -> Result<(), CartError> {
    for (&book_id, &quantity) in merged {
        let book = books
            .iter()
            .find(|b| b.id == book_id)
            .ok_or(CartError::BookNotFound(book_id))?;
        if book.status != BookStatus::Active {
            return Err(CartError::BookInactive(book.title.clone()));
        }
        if !has_stock(book.stock, quantity) {
            return Err(CartError::InsufficientStock {
                title: book.title.clone(),
                available: book.stock,
                requested: quantity,
            });
        }
    }
    Ok(())
}

/// Bag total at current prices. `Price` is never negative.
#[must_use]
pub fn bag_total(lines: &[BagLine]) -> Price {
    lines.iter().map(BagLine::subtotal).sum()
}

/// Bag total, if it fits the stored total column.
///
/// # Errors
///
/// Returns `CartError::TotalTooLarge` above [`Price::MAX_TOTAL`].
pub fn checked_total(lines: &[BagLine]) -> Result<Price, CartError> {
    let total = bag_total(lines);
    if total.fits_total() {
        Ok(total)
    } else {
        Err(CartError::TotalTooLarge)
    }
}

/// Service for the current user's bag.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's OPEN bag. An empty bag is returned if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn get(&self, user_id: UserId) -> Result<BagView, CartError> {
        let repo = BagRepository::new(self.pool);
        match repo.open_bag(user_id).await? {
            Some(bag_id) => {
                let lines = repo.lines(bag_id).await?;
                Ok(BagView::open(bag_id, user_id, &lines))
            }
            None => {
                // Only accounts created before bags existed lack one.
                let mut tx = self.pool.begin().await?;
                let bag_id = bags::lock_or_open(&mut tx, user_id).await?;
                tx.commit().await?;
                Ok(BagView::open(bag_id, user_id, &[]))
            }
        }
    }

    /// Add copies of a book.
    ///
    /// # Errors
    ///
    /// See [`plan_add`]; also `CartError::BookNotFound`.
    #[instrument(skip(self), fields(book_id = %delta.book_id, quantity = delta.quantity))]
    pub async fn add(&self, user_id: UserId, delta: BagDelta) -> Result<BagView, CartError> {
        if delta.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let mut tx = self.pool.begin().await?;
        let bag_id = bags::lock_or_open(&mut tx, user_id).await?;

        let book = lock_books(&mut tx, &[delta.book_id])
            .await?
            .pop()
            .ok_or(CartError::BookNotFound(delta.book_id))?;

        let lines = bags::lines(&mut tx, bag_id).await?;
        let existing = lines
            .iter()
            .find(|l| l.book_id == delta.book_id)
            .map(|l| l.quantity);

        let quantity = plan_add(&book, existing, delta.quantity)?;
        bags::set_quantity(&mut tx, bag_id, delta.book_id, quantity).await?;

        let view = finish(&mut tx, bag_id, user_id).await?;
        tx.commit().await?;
        debug!(bag_id = %bag_id, quantity, "Added to bag");
        Ok(view)
    }

    /// Remove copies of a book.
    ///
    /// # Errors
    ///
    /// See [`plan_remove`].
    #[instrument(skip(self), fields(book_id = %delta.book_id, quantity = delta.quantity))]
    pub async fn remove(&self, user_id: UserId, delta: BagDelta) -> Result<BagView, CartError> {
        let mut tx = self.pool.begin().await?;
        let bag_id = bags::lock_open(&mut tx, user_id)
            .await?
            .ok_or(CartError::EmptyBag)?;

        let lines = bags::lines(&mut tx, bag_id).await?;
        match plan_remove(&lines, delta.book_id, delta.quantity)? {
            RemoveOutcome::Keep(left) => {
                bags::set_quantity(&mut tx, bag_id, delta.book_id, left).await?;
            }
            RemoveOutcome::Drop => bags::remove_book(&mut tx, bag_id, delta.book_id).await?,
        }

        let view = finish(&mut tx, bag_id, user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Replace the bag contents with `items`.
    ///
    /// # Errors
    ///
    /// See [`merge_edit`] and [`check_edit`]. Nothing changes on error.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn edit(&self, user_id: UserId, items: &[EditItem]) -> Result<BagView, CartError> {
        let merged = merge_edit(items)?;

        let mut tx = self.pool.begin().await?;
        let bag_id = bags::lock_or_open(&mut tx, user_id).await?;

        let ids: Vec<BookId> = merged.keys().copied().collect();
        let books = lock_books(&mut tx, &ids).await?;
        check_edit(&merged, &books)?;

        bags::clear(&mut tx, bag_id).await?;
        for (&book_id, &quantity) in &merged {
            bags::set_quantity(&mut tx, bag_id, book_id, quantity).await?;
        }

        let view = finish(&mut tx, bag_id, user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Delete one line by its item id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the item is not in the user's bag.
    pub async fn delete_item(&self, user_id: UserId, item_id: BagItemId) -> Result<BagView, CartError> {
        let mut tx = self.pool.begin().await?;
        let bag_id = bags::lock_open(&mut tx, user_id)
            .await?
            .ok_or(CartError::ItemNotFound(item_id))?;

        if !bags::remove_item(&mut tx, bag_id, item_id).await? {
            return Err(CartError::ItemNotFound(item_id));
        }

        let view = finish(&mut tx, bag_id, user_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Empty the bag. The bag stays OPEN.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a statement fails.
    pub async fn clear(&self, user_id: UserId) -> Result<BagView, CartError> {
        let mut tx = self.pool.begin().await?;
        let bag_id = bags::lock_or_open(&mut tx, user_id).await?;
        bags::clear(&mut tx, bag_id).await?;
        let view = finish(&mut tx, bag_id, user_id).await?;
        tx.commit().await?;
        Ok(view)
    }
}

/// Recompute and store the total, then build the response view.
async fn finish(
    conn: &mut PgConnection,
    bag_id: BagId,
    user_id: UserId,
) -> Result<BagView, CartError> {
    let lines = bags::lines(conn, bag_id).await?;
    // An error here drops the transaction, undoing the change
    let total = checked_total(&lines)?;
    bags::store_total(conn, bag_id, total).await?;
    Ok(BagView::open(bag_id, user_id, &lines))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn book(id: i32, stock: i32, status: BookStatus) -> LockedBook {
        LockedBook {
            id: BookId::new(id),
            title: format!("Book {id}"),
            price: Price::from_minor(1000),
            stock,
            status,
        }
    }

    fn line(book_id: i32, quantity: u32, price_minor: u32) -> BagLine {
        BagLine {
            item_id: BagItemId::new(book_id * 10),
            book_id: BookId::new(book_id),
            title: format!("Book {book_id}"),
            unit_price: Price::from_minor(price_minor),
            quantity,
            stock: 5,
            status: BookStatus::Active,
        }
    }

    #[test]
    fn test_add_new_line_within_stock() {
        let b = book(1, 5, BookStatus::Active);
        assert_eq!(plan_add(&b, None, 5).unwrap(), 5);
    }

    #[test]
    fn test_add_counts_existing_quantity_against_stock() {
        let b = book(1, 5, BookStatus::Active);
        assert_eq!(plan_add(&b, Some(2), 3).unwrap(), 5);
        match plan_add(&b, Some(2), 4) {
            Err(CartError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[test]
    fn test_add_rejects_zero_and_inactive() {
        assert!(matches!(
            plan_add(&book(1, 5, BookStatus::Active), None, 0),
            Err(CartError::InvalidQuantity)
        ));
        assert!(matches!(
            plan_add(&book(1, 5, BookStatus::Inactive), None, 1),
            Err(CartError::BookInactive(_))
        ));
    }

    #[test]
    fn test_add_rejects_out_of_stock() {
        assert!(matches!(
            plan_add(&book(1, 0, BookStatus::Active), None, 1),
            Err(CartError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_remove_rules() {
        let lines = [line(1, 3, 500), line(2, 1, 700)];

        assert_eq!(
            plan_remove(&lines, BookId::new(1), 2).unwrap(),
            RemoveOutcome::Keep(1)
        );
        assert_eq!(
            plan_remove(&lines, BookId::new(1), 3).unwrap(),
            RemoveOutcome::Drop
        );
        assert!(matches!(
            plan_remove(&lines, BookId::new(1), 4),
            Err(CartError::RemoveExceedsQuantity {
                present: 3,
                requested: 4,
                ..
            })
        ));
        assert!(matches!(
            plan_remove(&lines, BookId::new(9), 1),
            Err(CartError::NotInBag(_))
        ));
        assert!(matches!(
            plan_remove(&[], BookId::new(1), 1),
            Err(CartError::EmptyBag)
        ));
    }

    #[test]
    fn test_merge_edit_combines_duplicates() {
        let merged = merge_edit(&[
            EditItem {
                book_id: BookId::new(2),
                quantity: 1,
            },
            EditItem {
                book_id: BookId::new(1),
                quantity: 2,
            },
            EditItem {
                book_id: BookId::new(2),
                quantity: 3,
            },
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&BookId::new(2)], 4);
        assert_eq!(merged[&BookId::new(1)], 2);
    }

    #[test]
    fn test_check_edit() {
        let books = [book(1, 2, BookStatus::Active), book(2, 9, BookStatus::Active)];

        let ok: BTreeMap<_, _> = [(BookId::new(1), 2), (BookId::new(2), 9)].into();
        assert!(check_edit(&ok, &books).is_ok());

        let over: BTreeMap<_, _> = [(BookId::new(1), 3)].into();
        assert!(matches!(
            check_edit(&over, &books),
            Err(CartError::InsufficientStock { .. })
        ));

        let missing: BTreeMap<_, _> = [(BookId::new(7), 1)].into();
        assert!(matches!(
            check_edit(&missing, &books),
            Err(CartError::BookNotFound(_))
        ));
    }

    #[test]
    fn test_total_is_sum_of_lines_and_zero_when_empty() {
        assert_eq!(bag_total(&[]), Price::ZERO);
        let lines = [line(1, 3, 500), line(2, 1, 700)];
        assert_eq!(bag_total(&lines), Price::from_minor(2200));
    }

    #[test]
    fn test_total_must_fit_column() {
        let mut expensive = line(1, 1000, 0);
        expensive.unit_price = Price::MAX_UNIT;
        assert!(matches!(
            checked_total(&[expensive.clone()]),
            Err(CartError::TotalTooLarge)
        ));

        expensive.quantity = 100;
        assert_eq!(
            checked_total(&[expensive]).unwrap(),
            Price::MAX_UNIT.times(100)
        );
    }
}
