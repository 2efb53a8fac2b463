//! Shipping quote endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::shipping::ShippingRate;
use crate::state::AppState;

/// Query parameters for a shipping quote.
#[derive(Debug, Deserialize)]
pub struct CostQuery {
    pub postal_code: String,
    /// Parcel weight in grams.
    pub weight: i64,
}

/// Quote response.
#[derive(Debug, Serialize)]
pub struct CostResponse {
    pub rates: Vec<ShippingRate>,
}

/// `GET /shipping/cost`
pub async fn cost(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<CostQuery>,
) -> Result<Json<CostResponse>> {
    if query.postal_code.trim().is_empty() {
        return Err(AppError::BadRequest("postal_code is required".to_owned()));
    }
    if query.weight <= 0 {
        return Err(AppError::BadRequest(
            "weight must be a positive number of grams".to_owned(),
        ));
    }

    let rates = state
        .shipping()
        .quote(query.postal_code.trim(), query.weight)
        .await?;

    Ok(Json(CostResponse { rates }))
}
