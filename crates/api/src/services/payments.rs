//! Payment gateway client (invoice creation).
//!
//! The gateway issues a payable invoice URL for an order; the buyer
//! completes payment there and the gateway's webhook later PATCHes the
//! order status. Requests use basic auth with the API key as username
//! and an empty password.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gerai_core::{AddressId, OrderId, UserId};

use crate::config::PaymentConfig;

/// Request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur when creating invoices.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The amount cannot be represented as a whole-currency integer.
    #[error("invalid invoice amount: {0}")]
    InvalidAmount(Decimal),
}

/// Invoice creation request body.
#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    external_id: String,
    /// Whole currency units (the gateway bills in integer rupiah).
    amount: i64,
    payer_email: &'a str,
    description: String,
}

/// Invoice creation response (only the fields we persist).
#[derive(Debug, Deserialize)]
pub struct Invoice {
    pub invoice_url: String,
}

/// Build the gateway external id for an order (`invoice-00000042`).
#[must_use]
pub fn external_id(order_id: OrderId) -> String {
    format!("invoice-{:08}", order_id.as_i64())
}

/// Build the invoice description (`user<id>-<address>`).
#[must_use]
pub fn invoice_description(user_id: UserId, address_id: AddressId) -> String {
    format!("user{user_id}-{address_id}")
}

/// Payment gateway API client.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl PaymentClient {
    /// Create a new payment gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    /// Create an invoice for `amount` (order total + shipping cost).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidAmount`] when the amount is not a
    /// non-negative whole number of currency units, and API/transport
    /// errors otherwise.
    pub async fn create_invoice(
        &self,
        order_id: OrderId,
        amount: Decimal,
        payer_email: &str,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<Invoice, PaymentError> {
        let whole = amount
            .to_i64()
            .filter(|n| *n >= 0 && Decimal::from(*n) == amount)
            .ok_or(PaymentError::InvalidAmount(amount))?;

        let body = CreateInvoiceBody {
            external_id: external_id(order_id),
            amount: whole,
            payer_email,
            description: invoice_description(user_id, address_id),
        };

        let url = format!("{}/v2/invoices", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(self.api_key.expose_secret(), Some(""))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_zero_pads() {
        assert_eq!(external_id(OrderId::new(7)), "invoice-00000007");
        assert_eq!(external_id(OrderId::new(12_345_678)), "invoice-12345678");
    }

    #[test]
    fn test_invoice_description() {
        assert_eq!(
            invoice_description(UserId::new(3), AddressId::new(11)),
            "user3-11"
        );
    }

    #[test]
    fn test_invoice_body_serialization() {
        let body = CreateInvoiceBody {
            external_id: external_id(OrderId::new(42)),
            amount: 48_000,
            payer_email: "buyer@example.com",
            description: invoice_description(UserId::new(1), AddressId::new(2)),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["external_id"], "invoice-00000042");
        assert_eq!(json["amount"], 48_000);
        assert_eq!(json["payer_email"], "buyer@example.com");
        assert_eq!(json["description"], "user1-2");
    }

    #[test]
    fn test_invoice_response_parsing() {
        let invoice: Invoice = serde_json::from_str(
            r#"{"id": "inv-1", "invoice_url": "https://checkout.test/inv-1", "status": "PENDING"}"#,
        )
        .unwrap();
        assert_eq!(invoice.invoice_url, "https://checkout.test/inv-1");
    }
}
