//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::catalog::BookCache;
use crate::services::inventory::StockAlerts;
use crate::services::token::TokenKeys;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenKeys,
    books: BookCache,
    alerts: StockAlerts,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let tokens = TokenKeys::new(config.jwt_secret.clone(), config.token_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                books: BookCache::new(),
                alerts: StockAlerts::new(),
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token signing keys.
    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    /// Get a reference to the book detail cache.
    #[must_use]
    pub fn books(&self) -> &BookCache {
        &self.inner.books
    }

    /// Get a reference to the low-stock alert channel.
    #[must_use]
    pub fn alerts(&self) -> &StockAlerts {
        &self.inner.alerts
    }
}
