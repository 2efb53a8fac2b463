//! Carrier rate API client (destination lookup + cost calculation).
//!
//! The resolver is stateless: every quote re-queries the external API.
//! Order placement re-quotes and matches the client's selected rate by
//! its `quote_id` token, so a client-supplied price is never trusted.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ShippingConfig;

/// Request timeout for both carrier API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when resolving shipping costs.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// No destination matched the postal code.
    #[error("no destination found for postal code: {0}")]
    NoDestination(String),

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One quoted carrier rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingRate {
    pub name: String,
    pub code: String,
    pub service: String,
    pub description: String,
    pub etd: String,
    pub cost: Decimal,
    /// Stable token identifying this rate; the client echoes it back in
    /// `POST /orders` and the workflow matches against a fresh quote.
    pub quote_id: String,
}

/// Envelope shared by both carrier API endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireDestination {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WireRate {
    name: String,
    code: String,
    service: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    etd: String,
    cost: i64,
}

impl From<WireRate> for ShippingRate {
    fn from(rate: WireRate) -> Self {
        let quote_id = quote_token(&rate.code, &rate.service, &rate.etd, rate.cost);
        Self {
            name: rate.name,
            code: rate.code,
            service: rate.service,
            description: rate.description,
            etd: rate.etd,
            cost: Decimal::from(rate.cost),
            quote_id,
        }
    }
}

/// Derive the stable quote token for a rate.
///
/// The token is a url-safe base64 encoding of the fields that identify
/// a rate within one quote (courier code, service, ETD, cost). Equal
/// rates always produce equal tokens, so a token from the preview quote
/// matches the re-quote at order time as long as the carrier still
/// offers the same rate.
fn quote_token(code: &str, service: &str, etd: &str, cost: i64) -> String {
    URL_SAFE_NO_PAD.encode(format!("{code}|{service}|{etd}|{cost}"))
}

/// Find the rate matching a client-selected quote token.
#[must_use]
pub fn find_rate<'a>(rates: &'a [ShippingRate], quote_id: &str) -> Option<&'a ShippingRate> {
    rates.iter().find(|rate| rate.quote_id == quote_id)
}

/// Carrier rate API client.
#[derive(Clone)]
pub struct ShippingClient {
    client: reqwest::Client,
    base_url: String,
    origin_id: String,
    couriers: String,
}

impl ShippingClient {
    /// Create a new carrier rate API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ShippingConfig) -> Result<Self, ShippingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "key",
            HeaderValue::from_str(config.api_key.expose_secret())
                .map_err(|e| ShippingError::Parse(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            origin_id: config.origin_id.clone(),
            couriers: config.couriers.clone(),
        })
    }

    /// Quote shipping rates for a destination postal code and weight (grams).
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::NoDestination`] when the postal code
    /// resolves to nothing, and API/transport errors otherwise.
    pub async fn quote(
        &self,
        postal_code: &str,
        weight: i64,
    ) -> Result<Vec<ShippingRate>, ShippingError> {
        let destination_id = self.lookup_destination(postal_code).await?;
        self.calculate_cost(destination_id, weight).await
    }

    /// Resolve a postal code to a destination id.
    ///
    /// The lookup can return several candidates; we select the first
    /// one. This is a known simplification - postal codes map to one
    /// delivery zone in practice, and the original quote and the
    /// order-time re-quote resolve identically either way.
    async fn lookup_destination(&self, postal_code: &str) -> Result<i64, ShippingError> {
        let url = format!(
            "{}/destination/domestic-destination",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", postal_code),
                ("limit", "5"),
                ("offset", "0"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<WireDestination> = response
            .json()
            .await
            .map_err(|e| ShippingError::Parse(e.to_string()))?;

        envelope
            .data
            .into_iter()
            .next()
            .map(|destination| destination.id)
            .ok_or_else(|| ShippingError::NoDestination(postal_code.to_owned()))
    }

    /// Calculate costs for the configured courier set.
    async fn calculate_cost(
        &self,
        destination_id: i64,
        weight: i64,
    ) -> Result<Vec<ShippingRate>, ShippingError> {
        let url = format!("{}/calculate/domestic-cost", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("origin", self.origin_id.as_str()),
                ("destination", &destination_id.to_string()),
                ("courier", &self.couriers),
                ("weight", &weight.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<WireRate> = response
            .json()
            .await
            .map_err(|e| ShippingError::Parse(e.to_string()))?;

        Ok(envelope.data.into_iter().map(ShippingRate::from).collect())
    }
}
