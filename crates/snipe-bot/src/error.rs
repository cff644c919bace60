//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid listing time: {0}")]
    Time(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error(transparent)]
    Exchange(#[from] snipe_exchange::ExchangeError),

    #[error(transparent)]
    Racer(#[from] snipe_racer::RacerError),

    #[error(transparent)]
    Core(#[from] snipe_core::CoreError),
}

pub type AppResult<T> = Result<T, AppError>;
