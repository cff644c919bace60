//! Take-profit monitor task.
//!
//! Phases: Watching -> SellSubmitted -> Settled | Aborted. The task is
//! detached from its spawner; the terminal outcome is delivered over a
//! oneshot channel that the spawner is free to drop.

use crate::target::TakeProfitTarget;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snipe_core::{Fill, Order, OrderSide, Price, Quantity};
use snipe_exchange::{ExchangeApi, MarketAmount};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Monitor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Ticker poll interval (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive ticker failures tolerated before giving up.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Grace delay before and between settlement queries (ms).
    #[serde(default = "default_settle_grace_ms")]
    pub settle_grace_ms: u64,
    /// Settlement query attempts after the sell is acked.
    #[serde(default = "default_settle_query_attempts")]
    pub settle_query_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_settle_grace_ms() -> u64 {
    500
}

fn default_settle_query_attempts() -> u32 {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
            settle_grace_ms: default_settle_grace_ms(),
            settle_query_attempts: default_settle_query_attempts(),
        }
    }
}

/// Monitor lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorPhase {
    Watching,
    SellSubmitted,
    Settled,
    Aborted,
}

impl MonitorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Aborted)
    }
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Watching => "watching",
            Self::SellSubmitted => "sell_submitted",
            Self::Settled => "settled",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Why a monitor gave up on its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The price feed failed too many times in a row.
    PriceFeedLost { consecutive_errors: u32 },
    /// The liquidating sell could not be placed.
    SellFailed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PriceFeedLost { consecutive_errors } => {
                write!(f, "price feed lost after {consecutive_errors} consecutive errors")
            }
            Self::SellFailed(msg) => write!(f, "sell failed: {msg}"),
        }
    }
}

/// Terminal result of a monitor.
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    /// The position was sold.
    Settled {
        symbol: String,
        /// Final known snapshot of the sell order.
        sell: Order,
        target: TakeProfitTarget,
        /// Confirmed realized fill. `None` when the sell was acked but
        /// settlement could not be confirmed within the query budget.
        realized: Option<Fill>,
    },
    /// The position is still held and no longer managed.
    Aborted {
        symbol: String,
        quantity_held: Quantity,
        last_price: Option<Price>,
        reason: AbortReason,
    },
}

/// Handle to a detached monitor task.
pub struct MonitorHandle {
    task: JoinHandle<()>,
    outcome: oneshot::Receiver<MonitorOutcome>,
}

impl MonitorHandle {
    /// Wait for the terminal outcome. `None` means the task was
    /// aborted before reaching a terminal phase.
    pub async fn wait(self) -> Option<MonitorOutcome> {
        self.outcome.await.ok()
    }

    /// Kill the monitor. The position stops being managed.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start a detached monitor for a held position.
///
/// The task owns its state exclusively and outlives the caller; the
/// returned handle is the only tie back to it.
pub fn spawn_monitor(
    venue: Arc<dyn ExchangeApi>,
    position: Fill,
    percent: Decimal,
    config: MonitorConfig,
) -> MonitorHandle {
    let target = TakeProfitTarget::new(position.avg_price, percent);
    let (tx, rx) = oneshot::channel();

    info!(
        symbol = %position.symbol,
        quantity = %position.quantity,
        base_price = %target.base_price(),
        target_price = %target.target_price(),
        percent = %percent,
        "Starting take-profit monitor"
    );

    let task = tokio::spawn(async move {
        let outcome = run_monitor(venue, position, target, config).await;
        // Detached by design; a dropped receiver is fine
        let _ = tx.send(outcome);
    });

    MonitorHandle { task, outcome: rx }
}

async fn run_monitor(
    venue: Arc<dyn ExchangeApi>,
    position: Fill,
    target: TakeProfitTarget,
    config: MonitorConfig,
) -> MonitorOutcome {
    let symbol = position.symbol.clone();
    let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut consecutive_errors = 0u32;
    let mut last_price: Option<Price> = None;

    // Watching
    let trigger_price = loop {
        interval.tick().await;

        match venue.ticker_price(&symbol).await {
            Ok(price) => {
                consecutive_errors = 0;
                last_price = Some(price);
                if target.is_reached(price) {
                    break price;
                }
                debug!(symbol = %symbol, price = %price, target = %target.target_price(), "Below target");
            }
            Err(err) => {
                consecutive_errors += 1;
                warn!(
                    symbol = %symbol,
                    error = %err,
                    consecutive_errors,
                    "Price poll failed"
                );
                if consecutive_errors >= config.max_consecutive_errors {
                    error!(
                        symbol = %symbol,
                        quantity_held = %position.quantity,
                        consecutive_errors,
                        "Price feed lost; leaving position unmanaged"
                    );
                    return MonitorOutcome::Aborted {
                        symbol,
                        quantity_held: position.quantity,
                        last_price,
                        reason: AbortReason::PriceFeedLost { consecutive_errors },
                    };
                }
            }
        }
    };

    info!(
        symbol = %symbol,
        price = %trigger_price,
        target = %target.target_price(),
        phase = %MonitorPhase::SellSubmitted,
        "Target reached, selling"
    );

    // SellSubmitted: one market sell for the full held quantity
    let ack = match venue
        .submit_order(&symbol, OrderSide::Sell, MarketAmount::Base(position.quantity))
        .await
    {
        Ok(ack) => ack,
        Err(err) => {
            error!(
                symbol = %symbol,
                quantity_held = %position.quantity,
                last_price = %trigger_price,
                error = %err,
                "Take-profit sell failed; position still held"
            );
            return MonitorOutcome::Aborted {
                symbol,
                quantity_held: position.quantity,
                last_price: Some(trigger_price),
                reason: AbortReason::SellFailed(err.to_string()),
            };
        }
    };

    let sell = confirm_settlement(venue.as_ref(), &symbol, ack, &config).await;
    let realized = Fill::from_order(&sell).ok();

    match &realized {
        Some(fill) => {
            let profit = fill.quote_spent - position.quote_spent;
            info!(
                symbol = %symbol,
                sell_price = %fill.avg_price,
                proceeds = %fill.quote_spent,
                profit_quote = %profit,
                phase = %MonitorPhase::Settled,
                "Position settled"
            );
        }
        None => {
            warn!(
                symbol = %symbol,
                order_id = %sell.id,
                status = %sell.status,
                "Sell acked but settlement unconfirmed within query budget"
            );
        }
    }

    MonitorOutcome::Settled {
        symbol,
        sell,
        target,
        realized,
    }
}

/// Confirm the sell's own fill, tolerating a not-yet-settled first
/// read with a grace delay between bounded retries.
async fn confirm_settlement(
    venue: &dyn ExchangeApi,
    symbol: &str,
    ack: Order,
    config: &MonitorConfig,
) -> Order {
    let grace = Duration::from_millis(config.settle_grace_ms);
    let mut latest = ack;

    for attempt in 0..config.settle_query_attempts {
        tokio::time::sleep(grace).await;

        match venue.query_order(symbol, &latest.id).await {
            Ok(order) => {
                if order.is_filled() && order.executed_qty.is_positive() {
                    return order;
                }
                debug!(
                    order_id = %order.id,
                    status = %order.status,
                    attempt,
                    "Sell not settled yet"
                );
                latest = order;
            }
            Err(err) => {
                warn!(order_id = %latest.id, error = %err, attempt, "Settlement query failed");
            }
        }
    }

    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use snipe_core::{ClientOrderId, OrderId, OrderKind, OrderStatus};
    use snipe_exchange::{ExchangeError, ExchangeResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Venue double driven by a scripted price tape.
    struct TapeVenue {
        /// `None` entries are transient ticker errors. The last entry
        /// repeats once the tape runs out.
        tape: Vec<Option<Decimal>>,
        cursor: AtomicUsize,
        sells: Mutex<Vec<MarketAmount>>,
        reject_sell: bool,
        settle_sell: bool,
    }

    impl TapeVenue {
        fn new(tape: Vec<Option<Decimal>>) -> Self {
            Self {
                tape,
                cursor: AtomicUsize::new(0),
                sells: Mutex::new(Vec::new()),
                reject_sell: false,
                settle_sell: true,
            }
        }

        fn sold_quantity(&self) -> Option<Quantity> {
            self.sells.lock().unwrap().first().map(|a| match a {
                MarketAmount::Base(q) => *q,
                MarketAmount::Quote(_) => panic!("sell sized in quote"),
            })
        }
    }

    #[async_trait]
    impl ExchangeApi for TapeVenue {
        async fn submit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            amount: MarketAmount,
        ) -> ExchangeResult<Order> {
            assert_eq!(side, OrderSide::Sell);
            if self.reject_sell {
                return Err(ExchangeError::Rejected {
                    code: -2010,
                    message: "Oversold".into(),
                });
            }
            self.sells.lock().unwrap().push(amount);
            Ok(Order {
                id: OrderId::new("sell-1"),
                client_order_id: ClientOrderId::new(),
                symbol: symbol.to_string(),
                side,
                kind: OrderKind::Market,
                status: OrderStatus::New,
                executed_qty: Quantity::ZERO,
                cumulative_quote: dec!(0),
            })
        }

        async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<Order> {
            let qty = self.sold_quantity().unwrap_or(Quantity::ZERO);
            if self.settle_sell {
                Ok(Order {
                    id: order_id.clone(),
                    client_order_id: ClientOrderId::new(),
                    symbol: symbol.to_string(),
                    side: OrderSide::Sell,
                    kind: OrderKind::Market,
                    status: OrderStatus::Filled,
                    executed_qty: qty,
                    cumulative_quote: qty.inner() * dec!(1.06),
                })
            } else {
                Ok(Order {
                    id: order_id.clone(),
                    client_order_id: ClientOrderId::new(),
                    symbol: symbol.to_string(),
                    side: OrderSide::Sell,
                    kind: OrderKind::Market,
                    status: OrderStatus::New,
                    executed_qty: Quantity::ZERO,
                    cumulative_quote: dec!(0),
                })
            }
        }

        async fn cancel_order(&self, _symbol: &str, _order_id: &OrderId) -> ExchangeResult<Order> {
            unimplemented!("monitor never cancels")
        }

        async fn ticker_price(&self, _symbol: &str) -> ExchangeResult<Price> {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            let entry = self
                .tape
                .get(i)
                .or_else(|| self.tape.last())
                .copied()
                .flatten();
            match entry {
                Some(price) => Ok(Price::new(price)),
                None => Err(ExchangeError::Http {
                    status: 502,
                    message: "bad gateway".into(),
                }),
            }
        }
    }

    fn held_position() -> Fill {
        Fill {
            symbol: "NEWUSDT".to_string(),
            order_id: OrderId::new("buy-1"),
            side: OrderSide::Buy,
            quantity: Quantity::new(dec!(40)),
            quote_spent: dec!(40),
            avg_price: Price::new(dec!(1.00)),
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 10,
            max_consecutive_errors: 3,
            settle_grace_ms: 10,
            settle_query_attempts: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sells_once_on_first_reading_at_target() {
        let tape = vec![
            Some(dec!(0.98)),
            Some(dec!(1.00)),
            Some(dec!(1.04)),
            Some(dec!(1.06)),
        ];
        let venue = Arc::new(TapeVenue::new(tape));

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        let outcome = handle.wait().await.expect("monitor finished");

        // Exactly one sell, for the full held quantity
        assert_eq!(venue.sells.lock().unwrap().len(), 1);
        assert_eq!(venue.sold_quantity(), Some(Quantity::new(dec!(40))));
        // Four readings: the 1.06 reading triggered
        assert_eq!(venue.cursor.load(Ordering::SeqCst), 4);

        match outcome {
            MonitorOutcome::Settled { realized, .. } => {
                let fill = realized.expect("settlement confirmed");
                assert_eq!(fill.quantity, Quantity::new(dec!(40)));
                assert_eq!(fill.avg_price, Price::new(dec!(1.06)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborts_after_consecutive_price_errors() {
        let venue = Arc::new(TapeVenue::new(vec![None]));

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        let outcome = handle.wait().await.expect("monitor finished");

        assert!(venue.sells.lock().unwrap().is_empty());
        match outcome {
            MonitorOutcome::Aborted {
                quantity_held,
                reason: AbortReason::PriceFeedLost { consecutive_errors },
                ..
            } => {
                assert_eq!(quantity_held, Quantity::new(dec!(40)));
                assert_eq!(consecutive_errors, 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_below_cap_are_tolerated() {
        // Two errors, then a recovery, then the target crossing
        let tape = vec![None, None, Some(dec!(1.00)), None, None, Some(dec!(1.06))];
        let venue = Arc::new(TapeVenue::new(tape));

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        let outcome = handle.wait().await.expect("monitor finished");

        assert!(matches!(outcome, MonitorOutcome::Settled { .. }));
        assert_eq!(venue.sells.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sell_failure_aborts_with_held_quantity() {
        let mut venue = TapeVenue::new(vec![Some(dec!(1.10))]);
        venue.reject_sell = true;
        let venue = Arc::new(venue);

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        let outcome = handle.wait().await.expect("monitor finished");

        match outcome {
            MonitorOutcome::Aborted {
                symbol,
                quantity_held,
                last_price,
                reason: AbortReason::SellFailed(_),
            } => {
                assert_eq!(symbol, "NEWUSDT");
                assert_eq!(quantity_held, Quantity::new(dec!(40)));
                assert_eq!(last_price, Some(Price::new(dec!(1.10))));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_settlement_still_settles() {
        let mut venue = TapeVenue::new(vec![Some(dec!(1.06))]);
        venue.settle_sell = false;
        let venue = Arc::new(venue);

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        let outcome = handle.wait().await.expect("monitor finished");

        match outcome {
            MonitorOutcome::Settled { realized, sell, .. } => {
                assert!(realized.is_none());
                assert_eq!(sell.id.as_str(), "sell-1");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_abort_stops_task() {
        // Price never reaches target; the monitor would watch forever
        let venue = Arc::new(TapeVenue::new(vec![Some(dec!(1.00))]));

        let handle = spawn_monitor(Arc::clone(&venue) as _, held_position(), dec!(5), fast_config());
        handle.abort();

        let outcome = handle.wait().await;
        assert!(outcome.is_none());
    }
}
