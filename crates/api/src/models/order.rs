//! Order and line-item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gerai_core::{AddressId, OrderId, OrderItemId, OrderStatus, UserId, VariantId};

/// Carrier/service snapshot stored on the order at placement time.
///
/// These fields describe the rate the buyer selected; they are copied
/// from the freshly fetched quote (never from client input) so later
/// carrier catalogue changes cannot rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetail {
    pub name: String,
    pub code: String,
    pub service: String,
    pub description: String,
    pub etd: String,
}

/// A placed purchase.
///
/// Created once by the order workflow; after creation only `status`
/// and `invoice_url` change.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub shipping_cost: Decimal,
    pub shipping_detail: ShippingDetail,
    pub invoice_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item referencing a product variant at order time.
///
/// `price` is the unit price snapshotted when the order was placed,
/// immutable afterwards - historical order value is decoupled from
/// later price changes.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_variant_id: VariantId,
    pub quantity: i32,
    pub price: Decimal,
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Dashboard counters for a user's cart and orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCounts {
    pub cart: i64,
    pub pending: i64,
    pub paid: i64,
    pub shipped: i64,
}
