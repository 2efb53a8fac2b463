//! Database operations for the Gerai `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users`, `user_addresses`, `user_sessions` - accounts and the
//!   bearer-token principal lookup
//! - `product_colours`, `products`, `product_variants` - catalog; the
//!   variant's `stock` column is the only contended shared state
//! - `orders`, `order_items` - placed purchases and their price snapshots
//! - `cart_items` - cart rows backing the dashboard counters
//! - `payment_checks` - the delayed payment-check queue (see [`crate::queue`])
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p gerai-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod orders;
pub mod sessions;
pub mod variants;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unknown foreign key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
