//! Inventory ledger over `product_variants.stock`.
//!
//! The stock counter is the only contended shared state in the system.
//! `reserve` must run inside the order-placement transaction so the
//! decrement and the order insert commit together or not at all;
//! `release` runs inside the reconciliation transaction for the same
//! reason. Both take a `PgConnection` so the caller controls the
//! transaction boundary.

use rust_decimal::Decimal;
use sqlx::{PgConnection, Row};
use thiserror::Error;

use gerai_core::VariantId;

/// Errors from stock reservation and release.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Not enough stock to satisfy the requested quantity.
    #[error("insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    Insufficient {
        variant_id: VariantId,
        requested: i32,
        available: i32,
    },

    /// The variant does not exist.
    #[error("unknown product variant: {0}")]
    UnknownVariant(VariantId),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reserve `quantity` units of a variant, returning its unit price.
///
/// Locks the variant row (`FOR UPDATE`) before the availability check so
/// concurrent reservations against the same variant serialize; the loser
/// of a race over the last units observes the committed decrement and
/// fails. The decrement is part of the caller's transaction - it is never
/// observable without the corresponding order row.
///
/// # Errors
///
/// Returns [`LedgerError::UnknownVariant`] if the variant does not exist,
/// [`LedgerError::Insufficient`] if `stock < quantity`, and
/// [`LedgerError::Database`] for query failures.
pub async fn reserve(
    conn: &mut PgConnection,
    variant_id: VariantId,
    quantity: i32,
) -> Result<Decimal, LedgerError> {
    let row = sqlx::query(
        r"
        SELECT stock, price
        FROM product_variants
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::UnknownVariant(variant_id))?;

    let stock: i32 = row.try_get("stock")?;
    let price: Decimal = row.try_get("price")?;

    if stock < quantity {
        return Err(LedgerError::Insufficient {
            variant_id,
            requested: quantity,
            available: stock,
        });
    }

    sqlx::query(
        r"
        UPDATE product_variants
        SET stock = stock - $2
        WHERE id = $1
        ",
    )
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(price)
}

/// Credit `quantity` units back to a variant.
///
/// Used only when a reserved order is determined never to have been
/// paid. The ledger itself is not idempotent - the caller must guard
/// against duplicate deliveries (the reconciliation consumer checks the
/// order status under lock before crediting).
///
/// # Errors
///
/// Returns [`LedgerError::UnknownVariant`] if the variant does not
/// exist, and [`LedgerError::Database`] for query failures.
pub async fn release(
    conn: &mut PgConnection,
    variant_id: VariantId,
    quantity: i32,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        r"
        UPDATE product_variants
        SET stock = stock + $2
        WHERE id = $1
        ",
    )
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::UnknownVariant(variant_id));
    }

    Ok(())
}
