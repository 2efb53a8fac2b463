//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// An order is created `Pending` and transitions exactly once:
/// - `Pending` -> `Paid` via the payment webhook (PATCH path)
/// - `Pending` -> `Cancelled` by the payment reconciliation consumer
///   when the grace period elapses without payment
/// - `Paid` -> `Shipped` by fulfilment
///
/// Stored in `PostgreSQL` as the `order_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "order_status"))]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Shipped,
}

impl OrderStatus {
    /// The status name as stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
            Self::Shipped => "Shipped",
        }
    }

    /// Whether the order still holds reserved stock.
    ///
    /// Only `Pending` orders have stock reserved but unsettled; every
    /// other status is terminal from the reconciliation consumer's
    /// point of view.
    #[must_use]
    pub const fn holds_reservation(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            "Shipped" => Ok(Self::Shipped),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognised order status.
#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Shipped,
        ] {
            assert_eq!(
                OrderStatus::from_str(status.as_str()).expect("parse"),
                status
            );
        }
    }

    #[test]
    fn test_status_unknown() {
        assert!(OrderStatus::from_str("Refunded").is_err());
    }

    #[test]
    fn test_only_pending_holds_reservation() {
        assert!(OrderStatus::Pending.holds_reservation());
        assert!(!OrderStatus::Paid.holds_reservation());
        assert!(!OrderStatus::Cancelled.holds_reservation());
        assert!(!OrderStatus::Shipped.holds_reservation());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Paid).expect("serialize"),
            "\"Paid\""
        );
        let status: OrderStatus = serde_json::from_str("\"Cancelled\"").expect("deserialize");
        assert_eq!(status, OrderStatus::Cancelled);
    }
}
