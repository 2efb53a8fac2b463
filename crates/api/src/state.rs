//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::queue::PaymentCheckQueue;
use crate::services::{OrderService, PaymentClient, ShippingClient};

/// Error constructing the shared state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("shipping client: {0}")]
    Shipping(#[from] crate::services::shipping::ShippingError),
    #[error("payment client: {0}")]
    Payment(#[from] crate::services::payments::PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: PgPool,
    shipping: ShippingClient,
    orders: OrderService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Builds the outbound API clients and the order service once; all
    /// handlers share them through this state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn new(config: &Config, pool: PgPool) -> Result<Self, StateError> {
        let shipping = ShippingClient::new(&config.shipping)?;
        let payments = PaymentClient::new(&config.payments)?;
        let queue = PaymentCheckQueue::new(pool.clone(), config.queue.visibility_timeout);
        let orders = OrderService::new(
            pool.clone(),
            shipping.clone(),
            payments,
            queue,
            config.queue.payment_grace_period,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                pool,
                shipping,
                orders,
            }),
        })
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the carrier rate client.
    #[must_use]
    pub fn shipping(&self) -> &ShippingClient {
        &self.inner.shipping
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
