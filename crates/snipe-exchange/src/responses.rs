//! Wire-format response types.
//!
//! The venue reports decimals as JSON strings and, depending on the
//! endpoint, order ids as either strings or numbers. Everything is
//! normalized here before the rest of the system sees it.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use snipe_core::{ClientOrderId, Order, OrderId, OrderKind, OrderSide, OrderStatus, Quantity};

/// Deserialize an order id that may arrive as a string or a number.
fn order_id_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Num(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

/// Order acknowledgment / query response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    #[serde(deserialize_with = "order_id_field")]
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub executed_qty: Option<Decimal>,
    // Venue spelling, sic
    #[serde(
        rename = "cummulativeQuoteQty",
        default,
        with = "rust_decimal::serde::str_option"
    )]
    pub cumulative_quote_qty: Option<Decimal>,
}

impl OrderResponse {
    /// Build the domain order from this response plus the request
    /// context the venue does not echo back reliably. The venue's own
    /// `side` wins over the fallback when present.
    pub fn into_order(self, side: OrderSide, kind: OrderKind, sent_cloid: ClientOrderId) -> Order {
        let side = self
            .side
            .as_deref()
            .and_then(OrderSide::from_venue)
            .unwrap_or(side);
        let status = self
            .status
            .as_deref()
            .map(OrderStatus::from_venue)
            .unwrap_or(OrderStatus::New);

        Order {
            id: OrderId::new(self.order_id),
            client_order_id: self
                .client_order_id
                .map(ClientOrderId::from_string)
                .unwrap_or(sent_cloid),
            symbol: self.symbol,
            side,
            kind,
            status,
            executed_qty: Quantity::new(self.executed_qty.unwrap_or_default()),
            cumulative_quote: self.cumulative_quote_qty.unwrap_or_default(),
        }
    }
}

/// Ticker price response.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Server time response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: i64,
}

/// One asset row from the account endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Account information response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<AssetBalance>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_response_query_shape() {
        let body = r#"{
            "symbol": "NEWUSDT",
            "orderId": "C02__443776347957968896",
            "clientOrderId": "snipe_1_abc",
            "status": "FILLED",
            "executedQty": "40",
            "cummulativeQuoteQty": "100"
        }"#;

        let resp: OrderResponse = serde_json::from_str(body).unwrap();
        let order = resp.into_order(OrderSide::Buy, OrderKind::Market, ClientOrderId::new());

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_qty, Quantity::new(dec!(40)));
        assert_eq!(order.cumulative_quote, dec!(100));
        assert_eq!(order.client_order_id.as_str(), "snipe_1_abc");
    }

    #[test]
    fn test_order_response_numeric_id_and_sparse_ack() {
        let body = r#"{"symbol": "NEWUSDT", "orderId": 443776347}"#;

        let resp: OrderResponse = serde_json::from_str(body).unwrap();
        let sent = ClientOrderId::new();
        let order = resp.into_order(OrderSide::Buy, OrderKind::Market, sent.clone());

        assert_eq!(order.id.as_str(), "443776347");
        assert_eq!(order.status, OrderStatus::New);
        assert!(order.executed_qty.is_zero());
        assert_eq!(order.client_order_id, sent);
    }

    #[test]
    fn test_order_response_side_overrides_fallback() {
        let body = r#"{"symbol": "NEWUSDT", "orderId": "1", "side": "SELL"}"#;
        let resp: OrderResponse = serde_json::from_str(body).unwrap();
        let order = resp.into_order(OrderSide::Buy, OrderKind::Market, ClientOrderId::new());
        assert_eq!(order.side, OrderSide::Sell);
    }

    #[test]
    fn test_ticker_price_response() {
        let body = r#"{"symbol": "NEWUSDT", "price": "2.52"}"#;
        let resp: TickerPriceResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.price, dec!(2.52));
    }

    #[test]
    fn test_account_response() {
        let body = r#"{"balances": [
            {"asset": "USDT", "free": "100.5", "locked": "0"},
            {"asset": "NEW", "free": "40", "locked": "1"}
        ]}"#;
        let resp: AccountResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.balances.len(), 2);
        assert_eq!(resp.balances[0].free, dec!(100.5));
    }
}
