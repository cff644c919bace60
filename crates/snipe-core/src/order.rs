//! Order state, identifiers, and realized fills.
//!
//! An `Order` is a snapshot of what the venue has acknowledged; it is
//! created on submission and refreshed only by querying the venue. A
//! `Fill` is the derived read-only view of a completed buy or sell.

use crate::decimal::{Price, Quantity};
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire representation expected by the venue.
    pub fn as_request_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Parse the venue's side string.
    pub fn from_venue(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_request_str())
    }
}

/// Order kind. Sniping is market-only; the venue's other kinds are
/// deliberately not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
}

impl OrderKind {
    pub fn as_request_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_request_str())
    }
}

/// Venue-reported order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    /// Any status string this client does not recognize.
    Unknown,
}

impl OrderStatus {
    /// Parse the venue's status string. Unrecognized values map to
    /// `Unknown` rather than failing the whole response.
    pub fn from_venue(s: &str) -> Self {
        match s {
            "NEW" => Self::New,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELED" | "EXPIRED" => Self::Canceled,
            "REJECTED" => Self::Rejected,
            _ => Self::Unknown,
        }
    }

    /// Whether the order can no longer change on the venue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Venue-assigned order identifier. Immutable for the order's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Client order ID for idempotency.
///
/// Every submission attempt carries a unique id so retries can never
/// be mistaken for duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `snipe_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("snipe_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// Snapshot of an order as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: ClientOrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Base quantity executed so far.
    pub executed_qty: Quantity,
    /// Quote currency spent (buys) or received (sells) so far.
    pub cumulative_quote: Decimal,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.status.is_filled()
    }
}

/// Realized fill derived from a filled order.
///
/// Construction is only valid when the order actually executed a
/// positive quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub order_id: OrderId,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub quote_spent: Decimal,
    pub avg_price: Price,
}

impl Fill {
    /// Derive a fill from an order snapshot.
    pub fn from_order(order: &Order) -> Result<Self> {
        if !order.executed_qty.is_positive() {
            return Err(CoreError::EmptyFill(order.id.to_string()));
        }
        let avg_price = Price::new(order.cumulative_quote / order.executed_qty.inner());
        Ok(Self {
            symbol: order.symbol.clone(),
            order_id: order.id.clone(),
            side: order.side,
            quantity: order.executed_qty,
            quote_spent: order.cumulative_quote,
            avg_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filled_order() -> Order {
        Order {
            id: OrderId::new("123456"),
            client_order_id: ClientOrderId::new(),
            symbol: "NEWUSDT".to_string(),
            side: OrderSide::Buy,
            kind: OrderKind::Market,
            status: OrderStatus::Filled,
            executed_qty: Quantity::new(dec!(40)),
            cumulative_quote: dec!(100),
        }
    }

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_status_from_venue() {
        assert_eq!(OrderStatus::from_venue("FILLED"), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_venue("CANCELED"), OrderStatus::Canceled);
        assert_eq!(OrderStatus::from_venue("EXPIRED"), OrderStatus::Canceled);
        assert_eq!(
            OrderStatus::from_venue("PENDING_WEIRDNESS"),
            OrderStatus::Unknown
        );
    }

    #[test]
    fn test_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(!OrderStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_client_order_id_unique() {
        let id1 = ClientOrderId::new();
        let id2 = ClientOrderId::new();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("snipe_"));
    }

    #[test]
    fn test_fill_from_order() {
        let order = filled_order();
        let fill = Fill::from_order(&order).unwrap();
        assert_eq!(fill.quantity, Quantity::new(dec!(40)));
        assert_eq!(fill.avg_price, Price::new(dec!(2.5)));
        assert_eq!(fill.quote_spent, dec!(100));
    }

    #[test]
    fn test_fill_rejects_empty_order() {
        let mut order = filled_order();
        order.executed_qty = Quantity::ZERO;
        assert!(Fill::from_order(&order).is_err());
    }
}
