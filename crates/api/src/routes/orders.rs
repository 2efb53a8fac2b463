//! Order endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use gerai_core::{OrderId, OrderStatus};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{OrderCounts, OrderWithItems, PageMeta};
use crate::services::orders::PlaceOrder;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters for the order list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Order list response with pagination metadata.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub orders: Vec<OrderWithItems>,
    pub meta: PageMeta,
}

/// `POST /orders`
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let order = state.orders().place_order(&user, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (orders, meta) = state
        .orders()
        .list_orders(&user, query.status, page, page_size)
        .await?;

    Ok(Json(ListResponse { orders, meta }))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let order = state.orders().get_order(&user, id).await?;
    Ok(Json(order))
}

/// Request body for status updates.
#[derive(Debug, Deserialize)]
pub struct PatchStatus {
    pub status: OrderStatus,
}

/// `PATCH /orders/{id}`
pub async fn patch_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(body): Json<PatchStatus>,
) -> Result<Json<Value>> {
    state.orders().set_status(&user, id, body.status).await?;
    Ok(Json(json!({ "id": id, "status": body.status })))
}

/// `GET /orders/count`
pub async fn counts(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrderCounts>> {
    let counts = state.orders().order_counts(&user).await?;
    Ok(Json(counts))
}
