//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors
//! to Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use gerai_core::OrderId;

use crate::db::RepositoryError;
use crate::db::variants::LedgerError;
use crate::services::payments::PaymentError;
use crate::services::shipping::ShippingError;

/// Application-level error type for the order API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stock reservation or release failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Shipping cost resolution failed.
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// The selected shipping rate no longer matches a fresh quote.
    #[error("Shipping selection does not match any quoted rate")]
    InvalidShippingSelection,

    /// Invoice creation failed after the order row was committed.
    ///
    /// The order is left `Pending` without an invoice URL - a
    /// recoverable state an operator retry path can resolve.
    #[error("Invoice creation failed for order {order_id}: {source}")]
    InvoicePending {
        order_id: OrderId,
        source: PaymentError,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Shipping(_) | Self::InvoicePending { .. }
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Ledger(err) => match err {
                LedgerError::Insufficient { .. } => StatusCode::CONFLICT,
                LedgerError::UnknownVariant(_) => StatusCode::NOT_FOUND,
                LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Shipping(err) => match err {
                ShippingError::NoDestination(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::InvalidShippingSelection => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvoicePending { .. } => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => "Not found".to_string(),
                RepositoryError::Conflict(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            },
            Self::Ledger(err) => match err {
                LedgerError::Insufficient { .. } => "Insufficient stock".to_string(),
                LedgerError::UnknownVariant(id) => format!("Unknown product variant: {id}"),
                LedgerError::Database(_) => "Internal server error".to_string(),
            },
            Self::Shipping(err) => match err {
                ShippingError::NoDestination(code) => {
                    format!("No shipping destination found for postal code {code}")
                }
                _ => "Shipping service error".to_string(),
            },
            Self::InvoicePending { order_id, .. } => format!(
                "Order {order_id} was created but invoice creation failed; retry the invoice"
            ),
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
