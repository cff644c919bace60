//! Venue operations trait.
//!
//! The racing and monitoring layers are written against this trait so
//! they can run against a scripted venue in tests.

use crate::error::ExchangeResult;
use async_trait::async_trait;
use rust_decimal::Decimal;
use snipe_core::{Order, OrderId, OrderSide, Price, Quantity};

/// How a market order is sized.
///
/// Buys spend a quote-currency budget; sells dispose of a base
/// quantity. The two are never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketAmount {
    /// Spend this much quote currency (buy side).
    Quote(Decimal),
    /// Trade this much base asset (sell side).
    Base(Quantity),
}

/// Operations the sniper needs from a venue.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Submit a market order. Returns the venue's acknowledgment
    /// snapshot; a fresh client order id is attached per call.
    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: MarketAmount,
    ) -> ExchangeResult<Order>;

    /// Fetch the authoritative current state of an order. Safe to repeat.
    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<Order>;

    /// Request cancellation. Cancelling an already-terminal order is a
    /// venue error the caller decides how to treat.
    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<Order>;

    /// Latest traded price for a symbol.
    async fn ticker_price(&self, symbol: &str) -> ExchangeResult<Price>;
}
