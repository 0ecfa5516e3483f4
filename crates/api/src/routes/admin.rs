//! Admin routes: order management, dashboard and live stock alerts.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::db::{DashboardRepository, OrderRepository, StockRepository};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{DashboardStats, LowStockBook, Order, OrderSummary, StockMovement};
use crate::services::inventory::StockAlert;
use crate::services::orders::{OrderListing, OrderService, StatusPatch};
use crate::state::AppState;

const DASHBOARD_LOW_STOCK_THRESHOLD: i32 = 10;
const DASHBOARD_LOW_STOCK_LIMIT: i64 = 10;
const DASHBOARD_RECENT_ORDERS: i64 = 10;
const DASHBOARD_STOCK_HISTORY: i64 = 20;

/// Everything the dashboard shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub low_stock_books: Vec<LowStockBook>,
    pub recent_orders: Vec<OrderSummary>,
    pub stock_history: Vec<StockMovement>,
}

#[derive(Debug, Deserialize)]
pub struct LowStockParams {
    #[serde(default = "default_threshold")]
    pub threshold: i32,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_threshold() -> i32 {
    10
}

const fn default_limit() -> i64 {
    20
}

/// GET /api/admin/orders
///
/// # Errors
///
/// 500 if the query fails.
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<OrderListing>> {
    Ok(Json(OrderService::new(state.pool()).list_all().await?))
}

/// PATCH /api/admin/orders/{orderNumber}
///
/// # Errors
///
/// 409 for a disallowed status change.
pub async fn update_order(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(number): Path<String>,
    Json(patch): Json<StatusPatch>,
) -> Result<Json<Order>> {
    let (order, restocked) = OrderService::new(state.pool())
        .update_status(&number, patch.status)
        .await?;
    state.books().invalidate(&restocked).await;
    Ok(Json(order))
}

/// GET /api/admin/dashboard
///
/// # Errors
///
/// 500 if any query fails.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Dashboard>> {
    let pool = state.pool();
    let dashboard = DashboardRepository::new(pool);
    let orders = OrderRepository::new(pool);
    let stock = StockRepository::new(pool);

    let (stats, low_stock_books, recent_orders, stock_history) = tokio::try_join!(
        dashboard.stats(),
        dashboard.low_stock(DASHBOARD_LOW_STOCK_THRESHOLD, DASHBOARD_LOW_STOCK_LIMIT),
        orders.recent(DASHBOARD_RECENT_ORDERS),
        stock.history(DASHBOARD_STOCK_HISTORY),
    )?;

    Ok(Json(Dashboard {
        stats,
        low_stock_books,
        recent_orders,
        stock_history,
    }))
}

/// GET /api/admin/dashboard/low-stock?threshold=10&limit=20
///
/// # Errors
///
/// 400 for a negative threshold or a limit outside 1..=100.
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Vec<LowStockBook>>> {
    if params.threshold < 0 || !(1..=100).contains(&params.limit) {
        return Err(crate::error::AppError::BadRequest(
            "threshold must be >= 0 and limit between 1 and 100".to_string(),
        ));
    }
    let books = DashboardRepository::new(state.pool())
        .low_stock(params.threshold, params.limit)
        .await?;
    Ok(Json(books))
}

/// GET /api/admin/stock-alerts
///
/// Server-sent events. The latest snapshot is sent first, then every alert
/// the watcher publishes.
pub async fn stock_alerts(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::info!(user_id = %admin.id, "Stock alert subscriber connected");

    let alerts = state.alerts().clone();
    let mut receiver = alerts.subscribe();
    let latest = alerts.latest().await;

    let stream = async_stream::stream! {
        if let Some(alert) = latest {
            yield Ok(alert_event(&alert));
        }
        loop {
            match receiver.recv().await {
                Ok(alert) => yield Ok(alert_event(&alert)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Stock alert subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn alert_event(alert: &StockAlert) -> Event {
    let json = serde_json::to_string(alert).unwrap_or_else(|_| {
        r#"{"message":"Failed to serialize alert","books":[]}"#.to_string()
    });
    Event::default().event("stock-alert").data(json)
}
