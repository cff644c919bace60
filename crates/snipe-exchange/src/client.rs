//! Authenticated REST client for the spot venue.

use crate::api::{ExchangeApi, MarketAmount};
use crate::credentials::Credentials;
use crate::error::{ExchangeError, ExchangeResult};
use crate::responses::{
    AccountResponse, AssetBalance, OrderResponse, ServerTimeResponse, TickerPriceResponse,
};
use crate::signer::Signer;
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use snipe_core::{ClientOrderId, Order, OrderId, OrderKind, OrderSide, Price};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Request timeout for venue calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-MEXC-APIKEY";

/// Default signed-request validity window.
const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

/// Authenticated venue client.
///
/// Holds only immutable credentials, the base URL, and a connection
/// pool; every operation is safe to call concurrently from any number
/// of tasks.
pub struct ExchangeClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    recv_window_ms: u64,
    /// Offset between the local clock and the venue clock (local - server).
    time_offset_ms: AtomicI64,
}

impl ExchangeClient {
    /// Create a client against the given base URL.
    pub fn new(credentials: Credentials, base_url: &str) -> ExchangeResult<Self> {
        Self::with_recv_window(credentials, base_url, DEFAULT_RECV_WINDOW_MS)
    }

    /// Create a client with an explicit recvWindow.
    pub fn with_recv_window(
        credentials: Credentials,
        base_url: &str,
        recv_window_ms: u64,
    ) -> ExchangeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms,
            time_offset_ms: AtomicI64::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Estimated current venue time based on the local clock and the
    /// last synchronized offset.
    pub fn server_timestamp_ms(&self) -> i64 {
        let local_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        local_time - self.time_offset_ms.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Time synchronization
    // ========================================================================

    /// Synchronize with the venue clock.
    ///
    /// Signed requests carry a timestamp the venue checks against
    /// recvWindow; call this at startup and again if timestamps start
    /// being rejected.
    pub async fn sync_time(&self) -> ExchangeResult<()> {
        let before = std::time::Instant::now();
        let response: ServerTimeResponse = self.unsigned_get("/api/v3/time", &[]).await?;
        let rtt = before.elapsed().as_millis() as i64;

        let local_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        // Estimate server time at the midpoint of the request
        let estimated_server_time = response.server_time + (rtt / 2);
        let offset = local_time - estimated_server_time;

        self.time_offset_ms.store(offset, Ordering::Relaxed);

        tracing::info!(
            server_time = response.server_time,
            offset_ms = offset,
            rtt_ms = rtt,
            "Time synchronized with venue"
        );

        Ok(())
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Fetch spot balances.
    ///
    /// GET /api/v3/account (signed)
    pub async fn account_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        let response: AccountResponse = self.signed_request(Method::GET, "/api/v3/account", &[]).await?;
        Ok(response.balances)
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    async fn unsigned_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> ExchangeResult<T> {
        let url = if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{}{}?{}", self.base_url, path, query)
        };

        tracing::debug!(url = %url, "GET request");
        let response = self.http.get(&url).send().await?;
        Self::handle_response(response).await
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> ExchangeResult<T> {
        let signer = Signer::new(&self.credentials);
        let query = signer.signed_query(params, self.server_timestamp_ms(), self.recv_window_ms);
        let url = format!("{}{}?{}", self.base_url, path, query);

        tracing::debug!(method = %method, path = %path, "Signed request");

        let response = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ExchangeResult<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                tracing::warn!(body = %body, error = %e, "Failed to parse venue response");
                ExchangeError::Parse(e.to_string())
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ExchangeError::from_api_response(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl ExchangeApi for ExchangeClient {
    /// Submit a market order.
    ///
    /// POST /api/v3/order (signed). Buys are sized by `quoteOrderQty`,
    /// sells by `quantity`.
    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: MarketAmount,
    ) -> ExchangeResult<Order> {
        let cloid = ClientOrderId::new();
        let amount_str = match amount {
            MarketAmount::Quote(q) => q.to_string(),
            MarketAmount::Base(q) => q.to_string(),
        };
        let amount_key = match amount {
            MarketAmount::Quote(_) => "quoteOrderQty",
            MarketAmount::Base(_) => "quantity",
        };

        let params = [
            ("symbol", symbol),
            ("side", side.as_request_str()),
            ("type", OrderKind::Market.as_request_str()),
            (amount_key, amount_str.as_str()),
            ("newClientOrderId", cloid.as_str()),
        ];

        tracing::debug!(
            symbol = %symbol,
            side = %side,
            amount = %amount_str,
            client_order_id = %cloid,
            "Submitting market order"
        );

        let response: OrderResponse = self
            .signed_request(Method::POST, "/api/v3/order", &params)
            .await?;

        let order = response.into_order(side, OrderKind::Market, cloid);
        tracing::info!(
            symbol = %symbol,
            order_id = %order.id,
            status = %order.status,
            "Order submitted"
        );

        Ok(order)
    }

    /// Fetch the authoritative state of an order.
    ///
    /// GET /api/v3/order (signed)
    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<Order> {
        let params = [("symbol", symbol), ("orderId", order_id.as_str())];

        let response: OrderResponse = self
            .signed_request(Method::GET, "/api/v3/order", &params)
            .await?;

        // Market-only client; the kind is not echoed back by every venue build
        Ok(response.into_order(OrderSide::Buy, OrderKind::Market, ClientOrderId::new()))
    }

    /// Request cancellation of an order.
    ///
    /// DELETE /api/v3/order (signed)
    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<Order> {
        let params = [("symbol", symbol), ("orderId", order_id.as_str())];

        let response: OrderResponse = self
            .signed_request(Method::DELETE, "/api/v3/order", &params)
            .await?;

        Ok(response.into_order(OrderSide::Buy, OrderKind::Market, ClientOrderId::new()))
    }

    /// Latest traded price.
    ///
    /// GET /api/v3/ticker/price (unsigned)
    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Price> {
        let params = [("symbol", symbol)];
        let response: TickerPriceResponse =
            self.unsigned_get("/api/v3/ticker/price", &params).await?;
        Ok(Price::new(response.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use snipe_core::Quantity;

    fn test_client(base_url: &str) -> ExchangeClient {
        ExchangeClient::new(Credentials::new("test-key", "test-secret"), base_url).unwrap()
    }

    #[tokio::test]
    async fn test_submit_market_buy_sends_quote_qty() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v3/order")
                    .header_exists(API_KEY_HEADER)
                    .query_param("symbol", "NEWUSDT")
                    .query_param("side", "BUY")
                    .query_param("type", "MARKET")
                    .query_param("quoteOrderQty", "100")
                    .query_param_exists("signature")
                    .query_param_exists("timestamp");
                then.status(200).json_body(json!({
                    "symbol": "NEWUSDT",
                    "orderId": "12345",
                    "status": "FILLED",
                    "executedQty": "40",
                    "cummulativeQuoteQty": "100"
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let order = client
            .submit_order("NEWUSDT", OrderSide::Buy, MarketAmount::Quote(dec!(100)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.id.as_str(), "12345");
        assert!(order.is_filled());
        assert_eq!(order.executed_qty, Quantity::new(dec!(40)));
    }

    #[tokio::test]
    async fn test_submit_market_sell_sends_base_qty() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v3/order")
                    .query_param("side", "SELL")
                    .query_param("quantity", "40");
                then.status(200).json_body(json!({
                    "symbol": "NEWUSDT",
                    "orderId": "777",
                    "status": "NEW"
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let order = client
            .submit_order(
                "NEWUSDT",
                OrderSide::Sell,
                MarketAmount::Base(Quantity::new(dec!(40))),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.status, snipe_core::OrderStatus::New);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_maps_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/v3/order");
                then.status(400)
                    .json_body(json!({"code": -2011, "msg": "Unknown order sent."}));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .cancel_order("NEWUSDT", &OrderId::new("999"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::OrderNotFound));
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v3/order");
                then.status(400)
                    .json_body(json!({"code": -1022, "msg": "Signature for this request is not valid."}));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .query_order("NEWUSDT", &OrderId::new("1"))
            .await
            .unwrap_err();

        assert!(err.is_fatal_auth());
    }

    #[tokio::test]
    async fn test_ticker_price() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v3/ticker/price")
                    .query_param("symbol", "NEWUSDT");
                then.status(200)
                    .json_body(json!({"symbol": "NEWUSDT", "price": "2.52"}));
            })
            .await;

        let client = test_client(&server.base_url());
        let price = client.ticker_price("NEWUSDT").await.unwrap();
        assert_eq!(price, Price::new(dec!(2.52)));
    }

    #[tokio::test]
    async fn test_account_balances() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v3/account")
                    .header_exists(API_KEY_HEADER)
                    .query_param_exists("signature");
                then.status(200).json_body(json!({
                    "balances": [
                        {"asset": "USDT", "free": "100.5", "locked": "0"}
                    ]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let balances = client.account_balances().await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].asset, "USDT");
    }
}
