//! Order history, cancellation and admin status changes.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use bookstore_core::{BookId, OrderId, OrderStatus, StockReason};

use crate::db::orders::{self, LockedOrder};
use crate::db::stock::{self, NewMovement};
use crate::db::{OrderRepository, ProfileRepository, RepositoryError, UserRepository};
use crate::models::{CurrentUser, Order, Profile};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("order {0} belongs to another customer")]
    Forbidden(String),

    #[error("order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("profile not found")]
    ProfileNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Admin status patch body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusPatch {
    pub status: OrderStatus,
}

/// All orders plus their count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListing {
    pub total: usize,
    pub orders: Vec<Order>,
}

/// Check whether `caller` may see or cancel an order owned by `owner`.
fn authorize(caller: &CurrentUser, order: &LockedOrder, number: &str) -> Result<(), OrderError> {
    if caller.is_admin() || caller.id == order.user_id {
        Ok(())
    } else {
        Err(OrderError::Forbidden(number.to_owned()))
    }
}

/// Check a status change.
///
/// # Errors
///
/// Returns `OrderError::InvalidTransition` unless `from -> to` is allowed.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list_mine(&self, caller: &CurrentUser) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(caller.id).await?)
    }

    /// One order, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Forbidden`.
    pub async fn get(&self, caller: &CurrentUser, number: &str) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_by_number(number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.to_owned()))?;

        if caller.is_admin() || caller.id == order.user_id {
            Ok(order)
        } else {
            // Hide other customers' order numbers.
            Err(OrderError::NotFound(number.to_owned()))
        }
    }

    /// Cancel a PROCESSING order and put its books back in stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` if the order already shipped
    /// or was closed.
    #[instrument(skip(self, caller), fields(user_id = %caller.id))]
    pub async fn cancel(
        &self,
        caller: &CurrentUser,
        number: &str,
    ) -> Result<(Order, Vec<BookId>), OrderError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_by_number(&mut tx, number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.to_owned()))?;
        authorize(caller, &order, number)?;

        if !order.status.is_cancellable() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let restocked = restock(&mut tx, order.id).await?;
        orders::set_status(&mut tx, order.id, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        info!(order_number = %number, books = restocked.len(), "Order cancelled");
        let updated = self.reload(number).await?;
        Ok((updated, restocked))
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list_all(&self) -> Result<OrderListing, OrderError> {
        let orders = self.orders.list_all().await?;
        Ok(OrderListing {
            total: orders.len(),
            orders,
        })
    }

    /// Move an order to a new status. Cancelling restores stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` for disallowed changes.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        number: &str,
        next: OrderStatus,
    ) -> Result<(Order, Vec<BookId>), OrderError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_by_number(&mut tx, number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.to_owned()))?;

        check_transition(order.status, next)?;

        let restocked = if next == OrderStatus::Cancelled {
            restock(&mut tx, order.id).await?
        } else {
            Vec::new()
        };
        orders::set_status(&mut tx, order.id, next).await?;
        tx.commit().await?;

        info!(order_number = %number, from = %order.status, to = %next, "Order status changed");
        let updated = self.reload(number).await?;
        Ok((updated, restocked))
    }

    /// The caller's profile: addresses and order numbers.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::ProfileNotFound` if the account has no profile.
    pub async fn profile(&self, caller: &CurrentUser) -> Result<Profile, OrderError> {
        let user = UserRepository::new(self.pool)
            .get_by_id(caller.id)
            .await?
            .ok_or(OrderError::ProfileNotFound)?;

        let (addresses, orders) = ProfileRepository::new(self.pool)
            .get(caller.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::ProfileNotFound,
                other => OrderError::Repository(other),
            })?;

        Ok(Profile {
            user,
            addresses,
            orders,
        })
    }

    async fn reload(&self, number: &str) -> Result<Order, OrderError> {
        self.orders
            .get_by_number(number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.to_owned()))
    }
}

/// Return an order's books to stock, recording CANCELLATION movements.
async fn restock(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<BookId>, OrderError> {
    let quantities = orders::restock_quantities(conn, order_id).await?;
    let ids: Vec<BookId> = quantities.iter().map(|(id, _)| *id).collect();
    let books = stock::lock_books(conn, &ids).await?;

    for book in &books {
        let Some(&(_, quantity)) = quantities.iter().find(|(id, _)| *id == book.id) else {
            continue;
        };
        let returned = i32::try_from(quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("quantity {quantity} out of range"))
        })?;
        stock::apply(
            conn,
            NewMovement {
                book_id: book.id,
                order_id: Some(order_id),
                previous_stock: book.stock,
                new_stock: book.stock.saturating_add(returned),
                reason: StockReason::Cancellation,
            },
        )
        .await?;
    }

    Ok(books.iter().map(|b| b.id).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookstore_core::{UserId, UserRole};

    fn caller(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: format!("user{id}@example.com"),
            role,
        }
    }

    fn locked(owner: i32) -> LockedOrder {
        LockedOrder {
            id: OrderId::new(1),
            user_id: UserId::new(owner),
            status: OrderStatus::Processing,
        }
    }

    #[test]
    fn test_owner_and_admin_may_act() {
        assert!(authorize(&caller(7, UserRole::Customer), &locked(7), "ORD-1").is_ok());
        assert!(authorize(&caller(1, UserRole::Admin), &locked(7), "ORD-1").is_ok());
        assert!(matches!(
            authorize(&caller(8, UserRole::Customer), &locked(7), "ORD-1"),
            Err(OrderError::Forbidden(_))
        ));
    }

    #[test]
    fn test_transitions() {
        assert!(check_transition(OrderStatus::Processing, OrderStatus::Shipped).is_ok());
        assert!(check_transition(OrderStatus::Shipped, OrderStatus::Completed).is_ok());
        assert!(check_transition(OrderStatus::Processing, OrderStatus::Cancelled).is_ok());

        assert!(matches!(
            check_transition(OrderStatus::Shipped, OrderStatus::Cancelled),
            Err(OrderError::InvalidTransition { .. })
        ));
        assert!(check_transition(OrderStatus::Completed, OrderStatus::Processing).is_err());
        assert!(check_transition(OrderStatus::Cancelled, OrderStatus::Cancelled).is_err());
    }
}
