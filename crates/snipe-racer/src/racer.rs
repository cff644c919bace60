//! Burst order racing.
//!
//! Launches waves of concurrent market-buy attempts inside a race
//! window. The first attempt observed filled wins; every other
//! obtained order id gets a best-effort cancel. Attempt-level venue
//! failures are contained; only authentication failures abort a race.

use crate::clock::{Clock, SystemClock};
use crate::error::{RacerError, RacerResult};
use crate::waiter::{DeadlineWaiter, DEFAULT_GRANULARITY_MS};
use crate::window::RaceWindow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snipe_core::{Fill, Order, OrderId};
use snipe_exchange::{ExchangeApi, ExchangeError, MarketAmount};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Racing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Concurrent attempts per wave.
    #[serde(default = "default_wave_width")]
    pub wave_width: usize,
    /// Maximum number of waves.
    #[serde(default = "default_max_waves")]
    pub max_waves: usize,
    /// Pause between waves (ms).
    #[serde(default = "default_wave_delay_ms")]
    pub wave_delay_ms: u64,
    /// Sleep increment while waiting for the arm time (ms).
    #[serde(default = "default_waiter_granularity_ms")]
    pub waiter_granularity_ms: u64,
}

fn default_wave_width() -> usize {
    1
}

fn default_max_waves() -> usize {
    20
}

fn default_wave_delay_ms() -> u64 {
    50
}

fn default_waiter_granularity_ms() -> u64 {
    DEFAULT_GRANULARITY_MS
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            wave_width: default_wave_width(),
            max_waves: default_max_waves(),
            wave_delay_ms: default_wave_delay_ms(),
            waiter_granularity_ms: default_waiter_granularity_ms(),
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> RacerResult<()> {
        if self.wave_width == 0 {
            return Err(RacerError::Config("wave_width must be at least 1".into()));
        }
        if self.max_waves == 0 {
            return Err(RacerError::Config("max_waves must be at least 1".into()));
        }
        Ok(())
    }
}

/// What happened to a single order attempt.
#[derive(Debug)]
enum AttemptOutcome {
    /// The venue reported the order filled.
    Filled(Order),
    /// The order exists but did not fill.
    Unfilled(Order),
    /// The attempt produced no order.
    Failed(ExchangeError),
}

/// Counters for a finished race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceReport {
    pub attempts_launched: usize,
    pub submit_failures: usize,
    pub waves_run: usize,
    pub cancels_issued: usize,
}

/// Terminal result of a race. A window that expires without a fill is
/// a normal outcome, not an error.
#[derive(Debug, Clone)]
pub enum RaceOutcome {
    Filled { fill: Fill, report: RaceReport },
    NoFill { report: RaceReport },
}

impl RaceOutcome {
    pub fn fill(&self) -> Option<&Fill> {
        match self {
            Self::Filled { fill, .. } => Some(fill),
            Self::NoFill { .. } => None,
        }
    }

    pub fn report(&self) -> &RaceReport {
        match self {
            Self::Filled { report, .. } | Self::NoFill { report } => report,
        }
    }
}

/// Races market-buy attempts against a listing moment.
pub struct BurstRacer {
    venue: Arc<dyn ExchangeApi>,
    clock: Arc<dyn Clock>,
    config: RaceConfig,
}

impl BurstRacer {
    pub fn new(venue: Arc<dyn ExchangeApi>, config: RaceConfig) -> RacerResult<Self> {
        Self::with_clock(venue, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        venue: Arc<dyn ExchangeApi>,
        clock: Arc<dyn Clock>,
        config: RaceConfig,
    ) -> RacerResult<Self> {
        config.validate()?;
        Ok(Self {
            venue,
            clock,
            config,
        })
    }

    /// Run a race: wait for the arm time, then fire waves until a fill
    /// or window expiry.
    pub async fn run(
        &self,
        symbol: &str,
        quote_amount: Decimal,
        window: RaceWindow,
    ) -> RacerResult<RaceOutcome> {
        let waiter = DeadlineWaiter::new(Arc::clone(&self.clock), self.config.waiter_granularity_ms);

        info!(
            symbol = %symbol,
            quote_amount = %quote_amount,
            arm_at = %window.arm_at(),
            expire_at = %window.expire_at(),
            wave_width = self.config.wave_width,
            max_waves = self.config.max_waves,
            "Arming race"
        );

        waiter.wait_until(window.arm_at()).await;

        let mut report = RaceReport::default();
        let mut winner: Option<Order> = None;
        let mut losers: Vec<OrderId> = Vec::new();

        for wave in 0..self.config.max_waves {
            if !window.is_open(self.clock.now()) {
                debug!(wave, "Window expired before wave launch");
                break;
            }

            self.run_wave(symbol, quote_amount, &mut report, &mut winner, &mut losers)
                .await?;

            if winner.is_some() {
                break;
            }

            // Inter-wave pause, bounded by the remaining window
            let now = self.clock.now();
            if !window.is_open(now) {
                break;
            }
            let remaining = (window.expire_at() - now).to_std().unwrap_or(Duration::ZERO);
            let delay = Duration::from_millis(self.config.wave_delay_ms).min(remaining);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        match winner {
            Some(order) => {
                report.cancels_issued = self.cancel_losers(symbol, &losers).await;
                let fill = Fill::from_order(&order)?;
                info!(
                    symbol = %symbol,
                    order_id = %fill.order_id,
                    quantity = %fill.quantity,
                    avg_price = %fill.avg_price,
                    attempts = report.attempts_launched,
                    cancels = report.cancels_issued,
                    "Race won"
                );
                Ok(RaceOutcome::Filled { fill, report })
            }
            None => {
                info!(
                    symbol = %symbol,
                    attempts = report.attempts_launched,
                    submit_failures = report.submit_failures,
                    waves = report.waves_run,
                    "Race ended without a fill"
                );
                Ok(RaceOutcome::NoFill { report })
            }
        }
    }

    /// Launch one wave and drain every attempt in it.
    ///
    /// Draining continues after a winner is observed so the ids of
    /// still-in-flight attempts are harvested for cancellation.
    async fn run_wave(
        &self,
        symbol: &str,
        quote_amount: Decimal,
        report: &mut RaceReport,
        winner: &mut Option<Order>,
        losers: &mut Vec<OrderId>,
    ) -> RacerResult<()> {
        let mut attempts = JoinSet::new();
        for _ in 0..self.config.wave_width {
            let venue = Arc::clone(&self.venue);
            let symbol = symbol.to_string();
            attempts.spawn(async move { run_attempt(venue, &symbol, quote_amount).await });
        }
        report.attempts_launched += self.config.wave_width;
        report.waves_run += 1;

        while let Some(joined) = attempts.join_next().await {
            let outcome = joined.map_err(|e| RacerError::Task(e.to_string()))?;
            match outcome {
                AttemptOutcome::Filled(order) => {
                    if winner.is_none() {
                        info!(order_id = %order.id, "Fill observed, winner selected");
                        *winner = Some(order);
                    } else {
                        // Never un-buy; the extra fill stands and is reported
                        warn!(
                            order_id = %order.id,
                            "Additional fill observed after winner; position is larger than requested"
                        );
                        losers.push(order.id);
                    }
                }
                AttemptOutcome::Unfilled(order) => losers.push(order.id),
                AttemptOutcome::Failed(err) if err.is_fatal_auth() => {
                    return Err(err.into());
                }
                AttemptOutcome::Failed(err) => {
                    report.submit_failures += 1;
                    warn!(error = %err, retryable = err.is_retryable(), "Order attempt failed");
                }
            }
        }

        Ok(())
    }

    /// Best-effort concurrent cancel of every non-winning id.
    ///
    /// An id that is already terminal on the venue rejects the cancel;
    /// that race is logged and ignored.
    async fn cancel_losers(&self, symbol: &str, losers: &[OrderId]) -> usize {
        let mut cancels = JoinSet::new();
        for order_id in losers {
            let venue = Arc::clone(&self.venue);
            let symbol = symbol.to_string();
            let order_id = order_id.clone();
            cancels.spawn(async move {
                let result = venue.cancel_order(&symbol, &order_id).await;
                (order_id, result)
            });
        }

        let issued = losers.len();
        while let Some(joined) = cancels.join_next().await {
            let Ok((order_id, result)) = joined else {
                continue;
            };
            match result {
                Ok(order) => debug!(order_id = %order.id, "Loser cancelled"),
                Err(ExchangeError::OrderNotFound) => {
                    debug!(order_id = %order_id, "Cancel lost the race, order already terminal")
                }
                Err(ExchangeError::Rejected { code, message }) => {
                    debug!(order_id = %order_id, code, message = %message, "Cancel rejected, order already terminal")
                }
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "Cancel failed")
                }
            }
        }

        issued
    }
}

/// One submit-then-confirm attempt.
async fn run_attempt(
    venue: Arc<dyn ExchangeApi>,
    symbol: &str,
    quote_amount: Decimal,
) -> AttemptOutcome {
    let ack = match venue
        .submit_order(symbol, snipe_core::OrderSide::Buy, MarketAmount::Quote(quote_amount))
        .await
    {
        Ok(order) => order,
        Err(err) => return AttemptOutcome::Failed(err),
    };

    if ack.is_filled() && ack.executed_qty.is_positive() {
        return AttemptOutcome::Filled(ack);
    }

    // The ack alone is not authoritative; confirm with a query
    match venue.query_order(symbol, &ack.id).await {
        Ok(order) if order.is_filled() && order.executed_qty.is_positive() => {
            AttemptOutcome::Filled(order)
        }
        Ok(order) => AttemptOutcome::Unfilled(order),
        Err(err) => {
            // The order exists even though we could not confirm it;
            // keep the id so it still gets cancelled
            warn!(order_id = %ack.id, error = %err, "Status query failed after ack");
            AttemptOutcome::Unfilled(ack)
        }
    }
}
