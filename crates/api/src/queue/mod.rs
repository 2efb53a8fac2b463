//! Postgres-backed delayed payment-check queue.
//!
//! Each placed order enqueues exactly one message whose delivery is
//! postponed by the payment grace period. The broker is the
//! `payment_checks` table: `deliver_after` is the delay timer,
//! `locked_until` is the visibility timeout, and claiming uses
//! `FOR UPDATE SKIP LOCKED` so multiple consumers never double-claim.
//!
//! Delivery is at-least-once: a consumer that crashes mid-message loses
//! its lock after the visibility timeout and the message becomes
//! claimable again. Idempotence lives in the consumer's status guard,
//! not here.

use std::time::Duration;

use sqlx::{PgConnection, PgPool, Row};

use gerai_core::OrderId;

pub mod consumer;

pub use consumer::{PaymentCheckConsumer, Reconciliation};

/// Base delay for redelivery after a negative acknowledgement.
const RETRY_BASE: Duration = Duration::from_secs(30);

/// Cap for the redelivery backoff.
const RETRY_MAX: Duration = Duration::from_secs(3600);

/// A claimed delayed message.
#[derive(Debug, Clone)]
pub struct PaymentCheckMessage {
    pub id: i64,
    pub order_id: OrderId,
    /// Delivery attempts so far, including this one.
    pub attempts: i32,
}

/// Handle to the delayed payment-check queue.
#[derive(Clone)]
pub struct PaymentCheckQueue {
    pool: PgPool,
    visibility_timeout: Duration,
}

impl PaymentCheckQueue {
    /// Create a queue handle.
    #[must_use]
    pub const fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
        }
    }

    /// Publish a payment check for `order_id`, delivered after `delay`.
    ///
    /// Takes a connection so the publish can join the order-placement
    /// transaction: the order row and its payment check commit together.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the insert fails.
    pub async fn enqueue(
        &self,
        conn: &mut PgConnection,
        order_id: OrderId,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO payment_checks (order_id, deliver_after)
            VALUES ($1, now() + make_interval(secs => $2))
            ",
        )
        .bind(order_id)
        .bind(delay.as_secs_f64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Claim the next due message, if any.
    ///
    /// The claimed message stays invisible to other consumers for the
    /// configured visibility timeout.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the claim query fails.
    pub async fn claim(&self) -> Result<Option<PaymentCheckMessage>, sqlx::Error> {
        let row = sqlx::query(
            r"
            UPDATE payment_checks
            SET locked_until = now() + make_interval(secs => $1),
                attempts = attempts + 1
            WHERE id = (
                SELECT id
                FROM payment_checks
                WHERE deliver_after <= now()
                  AND (locked_until IS NULL OR locked_until <= now())
                ORDER BY deliver_after
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, order_id, attempts
            ",
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(PaymentCheckMessage {
                id: row.try_get("id")?,
                order_id: OrderId::new(row.try_get("order_id")?),
                attempts: row.try_get("attempts")?,
            })),
            None => Ok(None),
        }
    }

    /// Acknowledge a processed message (removes it from the queue).
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the delete fails.
    pub async fn ack(&self, message_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM payment_checks WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Negatively acknowledge a message: release the lock and requeue it
    /// after an attempt-based backoff.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the update fails.
    pub async fn nack(&self, message_id: i64, attempts: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE payment_checks
            SET locked_until = NULL,
                deliver_after = now() + make_interval(secs => $2)
            WHERE id = $1
            ",
        )
        .bind(message_id)
        .bind(retry_backoff(attempts).as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Redelivery backoff: doubles per attempt, capped at [`RETRY_MAX`].
#[must_use]
fn retry_backoff(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16);
    let delay = RETRY_BASE.saturating_mul(1_u32 << exponent.unsigned_abs().min(16));
    delay.min(RETRY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_first_attempt_is_base() {
        assert_eq!(retry_backoff(1), RETRY_BASE);
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(retry_backoff(2), RETRY_BASE * 2);
        assert_eq!(retry_backoff(3), RETRY_BASE * 4);
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(retry_backoff(20), RETRY_MAX);
    }

    #[test]
    fn test_backoff_handles_zero_attempts() {
        assert_eq!(retry_backoff(0), RETRY_BASE);
    }
}
