//! HTTP route handlers for the order API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (pings the database)
//!
//! # Orders (require auth)
//! POST  /orders                - Place an order
//! GET   /orders                - List orders (?status=&page=&limit=)
//! GET   /orders/count          - Dashboard counters
//! GET   /orders/{id}           - Order detail with items
//! PATCH /orders/{id}           - Update order status
//!
//! # Shipping (requires auth)
//! GET  /shipping/cost          - Quote rates (?postal_code=&weight=)
//! ```

pub mod orders;
pub mod shipping;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place).get(orders::list))
        // `/count` must be registered alongside `/{id}` - axum routes
        // literal segments before captures.
        .route("/count", get(orders::counts))
        .route("/{id}", get(orders::show).patch(orders::patch_status))
}

/// Create the shipping routes router.
pub fn shipping_routes() -> Router<AppState> {
    Router::new().route("/cost", get(shipping::cost))
}
