//! Low-stock watcher.
//!
//! A background task queries ACTIVE books below the restock threshold on a
//! fixed interval, keeps the latest result, and broadcasts it to every
//! connected alert subscriber. Subscribers that fall behind skip the alerts
//! they missed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::{RepositoryError, StockRepository};
use crate::models::LowStockBook;

/// Message sent with every alert.
pub const RESTOCK_MESSAGE: &str = "Restock these books";

/// Alerts buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 16;

/// A low-stock alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAlert {
    pub message: &'static str,
    pub books: Vec<LowStockBook>,
}

impl StockAlert {
    #[must_use]
    pub const fn new(books: Vec<LowStockBook>) -> Self {
        Self {
            message: RESTOCK_MESSAGE,
            books,
        }
    }
}

/// Shared handle to the alert channel and the latest snapshot.
#[derive(Clone)]
pub struct StockAlerts {
    inner: Arc<StockAlertsInner>,
}

struct StockAlertsInner {
    sender: broadcast::Sender<StockAlert>,
    latest: RwLock<Option<StockAlert>>,
}

impl Default for StockAlerts {
    fn default() -> Self {
        Self::new()
    }
}

impl StockAlerts {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StockAlertsInner {
                sender,
                latest: RwLock::new(None),
            }),
        }
    }

    /// Receive every alert published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StockAlert> {
        self.inner.sender.subscribe()
    }

    /// The most recent alert, if the watcher has run.
    pub async fn latest(&self) -> Option<StockAlert> {
        self.inner.latest.read().await.clone()
    }

    /// Store an alert as the latest snapshot and send it to subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub async fn publish(&self, alert: StockAlert) -> usize {
        *self.inner.latest.write().await = Some(alert.clone());
        // No subscribers is not an error.
        self.inner.sender.send(alert).unwrap_or(0)
    }
}

/// Run one watcher tick.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn check_once(
    pool: &PgPool,
    alerts: &StockAlerts,
    threshold: i32,
) -> Result<usize, RepositoryError> {
    let books = StockRepository::new(pool).below_threshold(threshold).await?;

    if books.is_empty() {
        debug!(threshold, "No books below restock threshold");
    } else {
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        info!(threshold, count = books.len(), ?titles, "{RESTOCK_MESSAGE}");
    }

    let count = books.len();
    let receivers = alerts.publish(StockAlert::new(books)).await;
    debug!(receivers, "Stock alert published");
    Ok(count)
}

/// Spawn the watcher. Abort the returned handle to stop it.
pub fn spawn_watcher(
    pool: PgPool,
    alerts: StockAlerts,
    threshold: i32,
    period: Duration,
) -> JoinHandle<()> {
    info!(threshold, period_secs = period.as_secs(), "Spawning low-stock watcher");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = check_once(&pool, &alerts, threshold).await {
                warn!(error = %e, "Low-stock check failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookstore_core::BookId;

    fn low(id: i32, stock: i32) -> LowStockBook {
        LowStockBook {
            id: BookId::new(id),
            title: format!("Book {id}"),
            author_name: "Anon".to_owned(),
            stock,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers_and_updates_snapshot() {
        let alerts = StockAlerts::new();
        let mut first = alerts.subscribe();
        let mut second = alerts.subscribe();

        let sent = alerts.publish(StockAlert::new(vec![low(1, 2)])).await;

        assert_eq!(sent, 2);
        assert_eq!(first.recv().await.unwrap().books, vec![low(1, 2)]);
        assert_eq!(second.recv().await.unwrap().message, RESTOCK_MESSAGE);
        assert_eq!(alerts.latest().await.unwrap().books.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let alerts = StockAlerts::new();
        assert!(alerts.latest().await.is_none());
        assert_eq!(alerts.publish(StockAlert::new(Vec::new())).await, 0);
        assert!(alerts.latest().await.unwrap().books.is_empty());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_missed_alerts() {
        let alerts = StockAlerts::new();
        let mut slow = alerts.subscribe();

        for i in 0..(CHANNEL_CAPACITY + 4) {
            let stock = i32::try_from(i).unwrap();
            alerts.publish(StockAlert::new(vec![low(1, stock)])).await;
        }

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(4))
        ));
        assert!(slow.recv().await.is_ok());
    }

    #[test]
    fn test_alert_json_shape() {
        let json = serde_json::to_value(StockAlert::new(vec![low(3, 1)])).unwrap();
        assert_eq!(json["message"], "Restock these books");
        assert_eq!(json["books"][0]["authorName"], "Anon");
        assert_eq!(json["books"][0]["stock"], 1);
    }
}
