//! Order placement workflow.
//!
//! `place_order` is the write path that ties the whole system together:
//! stock reservation, price snapshotting, shipping re-validation, the
//! order insert and the delayed payment check all commit in one
//! transaction, then the gateway invoice is created post-commit.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use gerai_core::{AddressId, OrderId, OrderStatus, VariantId};

use crate::db::orders::{self, NewOrderItem};
use crate::db::variants;
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, OrderCounts, OrderWithItems, PageMeta, ShippingDetail};
use crate::queue::PaymentCheckQueue;
use crate::services::payments::PaymentClient;
use crate::services::shipping::{self, ShippingClient};

/// One requested line item.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderItem {
    pub product_variant_id: VariantId,
    pub quantity: i32,
}

/// Order placement request.
#[derive(Debug, Deserialize)]
pub struct PlaceOrder {
    pub address_id: AddressId,
    pub items: Vec<PlaceOrderItem>,
    /// Token of the shipping rate the buyer selected from a prior quote.
    pub quote_id: String,
    /// Destination postal code; must match the one the quote was for.
    pub postal_code: String,
    /// Total parcel weight in grams.
    pub weight: i64,
}

/// Order placement and lookup workflows.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    shipping: ShippingClient,
    payments: PaymentClient,
    queue: PaymentCheckQueue,
    payment_grace_period: Duration,
}

impl OrderService {
    /// Create the order service.
    #[must_use]
    pub const fn new(
        pool: PgPool,
        shipping: ShippingClient,
        payments: PaymentClient,
        queue: PaymentCheckQueue,
        payment_grace_period: Duration,
    ) -> Self {
        Self {
            pool,
            shipping,
            payments,
            queue,
            payment_grace_period,
        }
    }

    /// Place an order for the authenticated user.
    ///
    /// Re-quotes shipping and matches the buyer's selection by its quote
    /// token, so the client never dictates a price. Stock decrements,
    /// the order row, its items and the delayed payment check commit in
    /// one transaction; any reservation failure aborts them all.
    ///
    /// Invoice creation runs after the commit. If the gateway fails, the
    /// order stays `Pending` without an invoice URL and the error is
    /// surfaced with the order id so an operator retry can resolve it.
    ///
    /// # Errors
    ///
    /// `InvalidShippingSelection` when the quote token matches no fresh
    /// rate, `Ledger` errors for stock failures, `InvoicePending` when
    /// the order committed but the gateway call failed.
    #[instrument(skip(self, user, request), fields(user_id = %user.id, address_id = %request.address_id))]
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        request: PlaceOrder,
    ) -> Result<OrderWithItems> {
        if request.items.is_empty() {
            return Err(AppError::BadRequest("order has no items".to_owned()));
        }

        let rates = self
            .shipping
            .quote(&request.postal_code, request.weight)
            .await?;
        let rate = shipping::find_rate(&rates, &request.quote_id)
            .ok_or(AppError::InvalidShippingSelection)?;

        let shipping_detail = ShippingDetail {
            name: rate.name.clone(),
            code: rate.code.clone(),
            service: rate.service.clone(),
            description: rate.description.clone(),
            etd: rate.etd.clone(),
        };
        let shipping_cost = rate.cost;

        let lines = reservation_order(request.items);

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut total = Decimal::ZERO;
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            if line.quantity <= 0 {
                return Err(AppError::BadRequest(format!(
                    "invalid quantity {} for variant {}",
                    line.quantity, line.product_variant_id
                )));
            }
            let price = variants::reserve(&mut tx, line.product_variant_id, line.quantity).await?;
            total += price * Decimal::from(line.quantity);
            items.push(NewOrderItem {
                variant_id: line.product_variant_id,
                quantity: line.quantity,
                price,
            });
        }

        let mut order = orders::create(
            &mut tx,
            user.id,
            request.address_id,
            total,
            shipping_cost,
            &shipping_detail,
            &items,
        )
        .await?;

        self.queue
            .enqueue(&mut tx, order.order.id, self.payment_grace_period)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;

        info!(
            order_id = %order.order.id,
            %total,
            %shipping_cost,
            items = items.len(),
            "order placed"
        );

        match self
            .payments
            .create_invoice(
                order.order.id,
                total + shipping_cost,
                &user.email,
                user.id,
                request.address_id,
            )
            .await
        {
            Ok(invoice) => {
                orders::set_invoice_url(&self.pool, order.order.id, &invoice.invoice_url).await?;
                order.order.invoice_url = Some(invoice.invoice_url);
            }
            Err(source) => {
                warn!(
                    order_id = %order.order.id,
                    error = %source,
                    "order committed but invoice creation failed"
                );
                return Err(AppError::InvoicePending {
                    order_id: order.order.id,
                    source,
                });
            }
        }

        Ok(order)
    }

    /// List the user's orders with pagination metadata.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn list_orders(
        &self,
        user: &CurrentUser,
        status: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<OrderWithItems>, PageMeta)> {
        let (orders, total) =
            orders::list_for_user(&self.pool, user.id, status, page, page_size).await?;
        Ok((orders, PageMeta::new(page, page_size, total)))
    }

    /// Fetch one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the order is absent or owned by
    /// another user.
    pub async fn get_order(&self, user: &CurrentUser, order_id: OrderId) -> Result<OrderWithItems> {
        orders::get_for_user(&self.pool, user.id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    /// Update an order's status (payment webhook / fulfilment path).
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the order is absent or owned by
    /// another user.
    pub async fn set_status(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<()> {
        // Ownership check before the blind update.
        if orders::get_for_user(&self.pool, user.id, order_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!("order {order_id} not found")));
        }

        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        orders::set_status(&mut conn, order_id, status).await?;
        Ok(())
    }

    /// Dashboard counters for the user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn order_counts(&self, user: &CurrentUser) -> Result<OrderCounts> {
        Ok(orders::counts_for_user(&self.pool, user.id).await?)
    }
}

fn map_sqlx(e: sqlx::Error) -> AppError {
    AppError::Database(e.into())
}

/// Order line items by ascending variant id before reserving.
///
/// Concurrent multi-item orders then always lock variant rows in the
/// same sequence, so two orders naming the same variants in different
/// request order cannot deadlock against each other.
fn reservation_order(mut items: Vec<PlaceOrderItem>) -> Vec<PlaceOrderItem> {
    items.sort_by_key(|line| line.product_variant_id);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(variant: i64, quantity: i32) -> PlaceOrderItem {
        PlaceOrderItem {
            product_variant_id: VariantId::new(variant),
            quantity,
        }
    }

    #[test]
    fn test_reservation_order_sorts_by_variant() {
        let ordered = reservation_order(vec![line(9, 1), line(3, 2), line(7, 1)]);
        let ids: Vec<i64> = ordered
            .iter()
            .map(|l| l.product_variant_id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }

    #[test]
    fn test_reservation_order_is_input_order_independent() {
        let forward = reservation_order(vec![line(1, 1), line(2, 1)]);
        let reversed = reservation_order(vec![line(2, 1), line(1, 1)]);
        let forward_ids: Vec<i64> = forward
            .iter()
            .map(|l| l.product_variant_id.as_i64())
            .collect();
        let reversed_ids: Vec<i64> = reversed
            .iter()
            .map(|l| l.product_variant_id.as_i64())
            .collect();
        assert_eq!(forward_ids, reversed_ids);
    }
}
