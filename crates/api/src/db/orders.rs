//! Order repository.
//!
//! Orders and their line items are created in one transaction together
//! with the stock decrements (see [`crate::services::orders`]); an order
//! row exists iff all of its items were committed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};

use gerai_core::{AddressId, OrderId, OrderStatus, UserId, VariantId};

use super::RepositoryError;
use crate::models::{Order, OrderCounts, OrderItem, OrderWithItems, ShippingDetail};

/// A line item to insert, with its reserved unit price.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address_id: AddressId,
    status: OrderStatus,
    total: Decimal,
    shipping_cost: Decimal,
    shipping_detail: Json<ShippingDetail>,
    invoice_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            address_id: row.address_id,
            status: row.status,
            total: row.total,
            shipping_cost: row.shipping_cost,
            shipping_detail: row.shipping_detail.0,
            invoice_url: row.invoice_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = r"
    id, user_id, address_id, status, total, shipping_cost,
    shipping_detail, invoice_url, created_at, updated_at
";

/// Insert an order row and its line items inside the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` when a referenced address or
/// variant is missing, `RepositoryError::Database` otherwise.
pub async fn create(
    conn: &mut PgConnection,
    user_id: UserId,
    address_id: AddressId,
    total: Decimal,
    shipping_cost: Decimal,
    shipping_detail: &ShippingDetail,
    items: &[NewOrderItem],
) -> Result<OrderWithItems, RepositoryError> {
    let row: OrderRow = sqlx::query_as(&format!(
        r"
        INSERT INTO orders (user_id, address_id, status, total, shipping_cost, shipping_detail)
        VALUES ($1, $2, 'Pending', $3, $4, $5)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(address_id)
    .bind(total)
    .bind(shipping_cost)
    .bind(Json(shipping_detail))
    .fetch_one(&mut *conn)
    .await
    .map_err(map_fk_violation)?;

    let order: Order = row.into();

    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let item_row: OrderItem = sqlx::query_as(
            r"
            INSERT INTO order_items (order_id, product_variant_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_variant_id, quantity, price
            ",
        )
        .bind(order.id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(item.price)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_fk_violation)?;

        inserted.push(item_row);
    }

    Ok(OrderWithItems {
        order,
        items: inserted,
    })
}

/// Fetch one of a user's orders with its line items.
///
/// Returns `None` when the order does not exist or belongs to a
/// different user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_for_user(
    pool: &PgPool,
    user_id: UserId,
    order_id: OrderId,
) -> Result<Option<OrderWithItems>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE id = $1 AND user_id = $2
        "
    ))
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let order: Order = row.into();
    let items = items_for_order(pool, order.id).await?;

    Ok(Some(OrderWithItems { order, items }))
}

/// List a user's orders, newest first, with an optional status filter.
///
/// Returns the page of orders (each with its items) and the total number
/// of matching orders for pagination metadata.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: UserId,
    status: Option<OrderStatus>,
    page: u32,
    page_size: u32,
) -> Result<(Vec<OrderWithItems>, u64), RepositoryError> {
    let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

    let total: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*)
        FROM orders
        WHERE user_id = $1 AND ($2::order_status IS NULL OR status = $2)
        ",
    )
    .bind(user_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        r"
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE user_id = $1 AND ($2::order_status IS NULL OR status = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "
    ))
    .bind(user_id)
    .bind(status)
    .bind(i64::from(page_size))
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let order_ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
    let items: Vec<OrderItem> = sqlx::query_as(
        r"
        SELECT id, order_id, product_variant_id, quantity, price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&order_ids)
    .fetch_all(pool)
    .await?;

    let mut orders: Vec<OrderWithItems> = rows
        .into_iter()
        .map(|row| OrderWithItems {
            order: row.into(),
            items: Vec::new(),
        })
        .collect();

    for item in items {
        if let Some(entry) = orders.iter_mut().find(|o| o.order.id == item.order_id) {
            entry.items.push(item);
        }
    }

    Ok((orders, u64::try_from(total).unwrap_or(0)))
}

/// Fetch the line items of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items_for_order(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as(
        r"
        SELECT id, order_id, product_variant_id, quantity, price
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Fetch the line items of an order inside the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items_for_order_locked(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as(
        r"
        SELECT id, order_id, product_variant_id, quantity, price
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Lock an order row and return its current status.
///
/// Used by the reconciliation consumer: the `FOR UPDATE` lock makes the
/// status check and the subsequent release + cancel transition atomic
/// against a concurrent payment webhook.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_status(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<OrderStatus>, RepositoryError> {
    let row = sqlx::query(
        r"
        SELECT status
        FROM orders
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("status")?)),
        None => Ok(None),
    }
}

/// Update an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist,
/// `RepositoryError::Database` for other failures.
pub async fn set_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE orders
        SET status = $2, updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(order_id)
    .bind(status)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Persist the payment gateway invoice URL on an order.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist,
/// `RepositoryError::Database` for other failures.
pub async fn set_invoice_url(
    pool: &PgPool,
    order_id: OrderId,
    invoice_url: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE orders
        SET invoice_url = $2, updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(order_id)
    .bind(invoice_url)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Dashboard counters: cart rows plus orders per status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn counts_for_user(
    pool: &PgPool,
    user_id: UserId,
) -> Result<OrderCounts, RepositoryError> {
    let row = sqlx::query(
        r"
        SELECT
            (SELECT COUNT(*) FROM cart_items WHERE user_id = $1 AND quantity > 0) AS cart,
            COUNT(*) FILTER (WHERE status = 'Pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'Paid') AS paid,
            COUNT(*) FILTER (WHERE status = 'Shipped') AS shipped
        FROM orders
        WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(OrderCounts {
        cart: row.try_get("cart")?,
        pending: row.try_get("pending")?,
        paid: row.try_get("paid")?,
        shipped: row.try_get("shipped")?,
    })
}

/// Map foreign-key violations to `Conflict` so callers can surface a
/// client error instead of a 500.
fn map_fk_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict("referenced entity does not exist".to_owned());
    }
    RepositoryError::Database(e)
}
