//! Listing sniper - entry point.
//!
//! Races market buys against a scheduled listing moment, then rides
//! the position to a take-profit target.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

/// Listing sniper for scheduled spot listings
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SNIPE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Race a scheduled listing and optionally ride it to take-profit
    Snipe {
        /// Trading pair, e.g. NEWUSDT
        symbol: String,
        /// Quote currency to spend
        #[arg(long)]
        amount: Decimal,
        /// Listing moment, "YYYY-MM-DD HH:MM:SS" in the announcement timezone
        #[arg(long)]
        listing_time: String,
        /// Take-profit percent; omit to hold after the fill
        #[arg(long)]
        take_profit: Option<Decimal>,
    },
    /// Buy immediately and ride to take-profit
    Trade {
        symbol: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        take_profit: Decimal,
    },
    /// Manual market buy sized in quote currency
    Buy {
        symbol: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Manual market sell of a base quantity
    Sell {
        symbol: String,
        #[arg(long)]
        quantity: Decimal,
    },
    /// Show non-zero spot balances
    Balances,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    snipe_telemetry::init_logging()?;

    info!("Starting snipe-bot v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > SNIPE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SNIPE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = snipe_bot::AppConfig::load(&config_path)?;

    let app = snipe_bot::Application::new(config)?;

    match args.command {
        Command::Snipe {
            symbol,
            amount,
            listing_time,
            take_profit,
        } => {
            app.snipe(&symbol, amount, &listing_time, take_profit)
                .await?;
        }
        Command::Trade {
            symbol,
            amount,
            take_profit,
        } => {
            app.trade(&symbol, amount, take_profit).await?;
        }
        Command::Buy { symbol, amount } => {
            let order = app.buy(&symbol, amount).await?;
            info!(
                order_id = %order.id,
                status = %order.status,
                executed_qty = %order.executed_qty,
                "Buy placed"
            );
        }
        Command::Sell { symbol, quantity } => {
            let order = app.sell(&symbol, quantity).await?;
            info!(
                order_id = %order.id,
                status = %order.status,
                executed_qty = %order.executed_qty,
                "Sell placed"
            );
        }
        Command::Balances => {
            for balance in app.balances().await? {
                info!(
                    asset = %balance.asset,
                    free = %balance.free,
                    locked = %balance.locked,
                    "Balance"
                );
            }
        }
    }

    Ok(())
}
