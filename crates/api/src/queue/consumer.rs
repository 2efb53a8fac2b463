//! Payment reconciliation consumer.
//!
//! Long-running task that drains the delayed payment-check queue. For
//! each delivered message it re-examines the order: a still-`Pending`
//! order never got paid within the grace period, so its reserved stock
//! is credited back and the order is cancelled - release and terminal
//! transition happen in one transaction, guarded by the status check
//! under row lock, which makes duplicate deliveries harmless.
//!
//! Processing errors never crash the consumer; the message is
//! negatively acknowledged and redelivered with backoff.

use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use gerai_core::{OrderId, OrderStatus};

use super::{PaymentCheckMessage, PaymentCheckQueue};
use crate::db::variants::LedgerError;
use crate::db::{RepositoryError, orders, variants};

/// Errors from processing a single payment-check message.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of reconciling one order.
#[derive(Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Stock was credited back and the order cancelled.
    Released { items: usize },
    /// The order already left `Pending`; nothing to reconcile.
    AlreadySettled(OrderStatus),
    /// The order no longer exists (cascade-deleted with its user).
    UnknownOrder,
}

/// Payment reconciliation consumer.
pub struct PaymentCheckConsumer {
    pool: PgPool,
    queue: PaymentCheckQueue,
    poll_interval: Duration,
}

impl PaymentCheckConsumer {
    /// Create a consumer over the given queue.
    #[must_use]
    pub const fn new(pool: PgPool, queue: PaymentCheckQueue, poll_interval: Duration) -> Self {
        Self {
            pool,
            queue,
            poll_interval,
        }
    }

    /// Run the consumer until the surrounding task is cancelled.
    ///
    /// Messages are processed one at a time; when the queue is idle the
    /// loop sleeps for the poll interval.
    pub async fn run(&self) {
        info!(poll_interval = ?self.poll_interval, "payment check consumer started");

        loop {
            match self.queue.claim().await {
                Ok(Some(message)) => self.process(message).await,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!(error = %e, "failed to claim payment check message");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Handle one delivered message: reconcile, then ack or nack.
    #[instrument(skip(self, message), fields(order_id = %message.order_id, attempt = message.attempts))]
    async fn process(&self, message: PaymentCheckMessage) {
        match self.reconcile(message.order_id).await {
            Ok(outcome) => {
                match outcome {
                    Reconciliation::Released { items } => {
                        info!(items, "released stock for unpaid order and cancelled it");
                    }
                    Reconciliation::AlreadySettled(status) => {
                        debug!(%status, "order already settled, nothing to reconcile");
                    }
                    Reconciliation::UnknownOrder => {
                        warn!("payment check referenced a missing order");
                    }
                }
                if let Err(e) = self.queue.ack(message.id).await {
                    // Redelivery will hit the status guard and no-op.
                    error!(error = %e, "failed to ack payment check message");
                }
            }
            Err(e) => {
                error!(error = %e, "payment check processing failed, requeueing");
                if let Err(e) = self.queue.nack(message.id, message.attempts).await {
                    error!(error = %e, "failed to nack payment check message");
                }
            }
        }
    }

    /// Re-examine an order and release its reservation if still unpaid.
    ///
    /// The whole check-release-cancel sequence runs in one transaction
    /// with the order row locked, so a concurrent payment webhook either
    /// commits `Paid` before the lock (we see it and skip) or blocks
    /// until the cancellation commits (it then fails its own guard).
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError` when a query inside the transaction
    /// fails; the caller nacks the message and redelivery retries.
    pub async fn reconcile(&self, order_id: OrderId) -> Result<Reconciliation, ConsumerError> {
        let mut tx = self.pool.begin().await?;

        let Some(status) = orders::lock_status(&mut tx, order_id).await? else {
            return Ok(Reconciliation::UnknownOrder);
        };

        if !status.holds_reservation() {
            return Ok(Reconciliation::AlreadySettled(status));
        }

        let items = orders::items_for_order_locked(&mut tx, order_id).await?;
        for item in &items {
            variants::release(&mut tx, item.product_variant_id, item.quantity).await?;
        }

        orders::set_status(&mut tx, order_id, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        Ok(Reconciliation::Released { items: items.len() })
    }
}
