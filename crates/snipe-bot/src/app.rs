//! Application wiring.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use snipe_core::{Fill, Order, OrderSide, Quantity};
use snipe_exchange::{AssetBalance, ExchangeApi, ExchangeClient, MarketAmount};
use snipe_monitor::{spawn_monitor, MonitorOutcome};
use snipe_racer::{BurstRacer, RaceOutcome, RaceWindow};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Listing-time format used in venue announcements.
const LISTING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wires the venue client, racer, and monitor together.
pub struct Application {
    client: Arc<ExchangeClient>,
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let credentials = config.credentials()?;
        let client = ExchangeClient::with_recv_window(
            credentials,
            &config.base_url,
            config.recv_window_ms,
        )?;

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Interpret an announced listing time (`YYYY-MM-DD HH:MM:SS` in
    /// the venue's announcement timezone) as a UTC instant.
    pub fn parse_listing_time(&self, s: &str) -> AppResult<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(s, LISTING_TIME_FORMAT)
            .map_err(|e| AppError::Time(format!("'{s}' does not match '{LISTING_TIME_FORMAT}': {e}")))?;

        let offset = FixedOffset::east_opt(self.config.utc_offset_hours * 3600)
            .ok_or_else(|| AppError::Time(format!(
                "utc_offset_hours {} out of range",
                self.config.utc_offset_hours
            )))?;

        let local = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| AppError::Time(format!("'{s}' is ambiguous in the configured offset")))?;

        Ok(local.with_timezone(&Utc))
    }

    /// Race a listing: wait for the announced moment, burst buy, and
    /// optionally hand the fill to a take-profit monitor.
    pub async fn snipe(
        &self,
        symbol: &str,
        quote_amount: Decimal,
        listing_time: &str,
        take_profit_pct: Option<Decimal>,
    ) -> AppResult<()> {
        let arm_at = self.parse_listing_time(listing_time)?;
        let window = RaceWindow::with_duration_ms(arm_at, self.config.window_open_ms)?;

        self.client.sync_time().await?;

        let racer = BurstRacer::new(
            Arc::clone(&self.client) as Arc<dyn ExchangeApi>,
            self.config.race.clone(),
        )?;

        match racer.run(symbol, quote_amount, window).await? {
            RaceOutcome::Filled { fill, report } => {
                info!(
                    symbol = %symbol,
                    quantity = %fill.quantity,
                    avg_price = %fill.avg_price,
                    attempts = report.attempts_launched,
                    "Snipe filled"
                );
                if let Some(pct) = take_profit_pct {
                    self.monitor_until_done(fill, pct).await;
                }
            }
            RaceOutcome::NoFill { report } => {
                warn!(
                    symbol = %symbol,
                    attempts = report.attempts_launched,
                    submit_failures = report.submit_failures,
                    "Snipe ended without a fill"
                );
            }
        }

        Ok(())
    }

    /// Buy immediately and ride the position to the take-profit target.
    pub async fn trade(
        &self,
        symbol: &str,
        quote_amount: Decimal,
        take_profit_pct: Decimal,
    ) -> AppResult<()> {
        self.client.sync_time().await?;

        let ack = self
            .client
            .submit_order(symbol, OrderSide::Buy, MarketAmount::Quote(quote_amount))
            .await?;

        let order = if ack.is_filled() && ack.executed_qty.is_positive() {
            ack
        } else {
            self.client.query_order(symbol, &ack.id).await?
        };

        if !order.is_filled() {
            return Err(AppError::Order(format!(
                "entry buy {} did not fill (status {})",
                order.id, order.status
            )));
        }

        let fill = Fill::from_order(&order)?;
        info!(
            symbol = %symbol,
            quantity = %fill.quantity,
            avg_price = %fill.avg_price,
            "Entry filled"
        );

        self.monitor_until_done(fill, take_profit_pct).await;
        Ok(())
    }

    /// Manual market buy sized in quote currency.
    pub async fn buy(&self, symbol: &str, quote_amount: Decimal) -> AppResult<Order> {
        self.client.sync_time().await?;
        let order = self
            .client
            .submit_order(symbol, OrderSide::Buy, MarketAmount::Quote(quote_amount))
            .await?;
        Ok(order)
    }

    /// Manual market sell of a base quantity.
    pub async fn sell(&self, symbol: &str, quantity: Decimal) -> AppResult<Order> {
        self.client.sync_time().await?;
        let order = self
            .client
            .submit_order(
                symbol,
                OrderSide::Sell,
                MarketAmount::Base(Quantity::new(quantity)),
            )
            .await?;
        Ok(order)
    }

    /// Spot balances, non-zero rows only.
    pub async fn balances(&self) -> AppResult<Vec<AssetBalance>> {
        self.client.sync_time().await?;
        let balances = self.client.account_balances().await?;
        Ok(balances
            .into_iter()
            .filter(|b| !b.free.is_zero() || !b.locked.is_zero())
            .collect())
    }

    /// Start the detached monitor and, since this is a CLI run, wait
    /// for its terminal outcome before returning.
    async fn monitor_until_done(&self, fill: Fill, take_profit_pct: Decimal) {
        let handle = spawn_monitor(
            Arc::clone(&self.client) as Arc<dyn ExchangeApi>,
            fill,
            take_profit_pct,
            self.config.monitor.clone(),
        );

        match handle.wait().await {
            Some(MonitorOutcome::Settled { symbol, realized, .. }) => match realized {
                Some(sell) => info!(
                    symbol = %symbol,
                    sell_price = %sell.avg_price,
                    proceeds = %sell.quote_spent,
                    "Take-profit settled"
                ),
                None => warn!(symbol = %symbol, "Take-profit sell acked but unconfirmed"),
            },
            Some(MonitorOutcome::Aborted {
                symbol,
                quantity_held,
                last_price,
                reason,
            }) => error!(
                symbol = %symbol,
                quantity_held = %quantity_held,
                last_price = ?last_price,
                reason = %reason,
                "Monitor aborted; position still held"
            ),
            None => error!("Monitor task ended without an outcome"),
        }
    }
}
