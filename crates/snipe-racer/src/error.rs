//! Error types for snipe-racer.

use thiserror::Error;

/// Racing errors.
///
/// Per-attempt venue failures are contained inside the race and do not
/// surface here; only systemic failures abort a race.
#[derive(Debug, Error)]
pub enum RacerError {
    #[error("Invalid race window: {0}")]
    Window(String),

    #[error("Invalid race config: {0}")]
    Config(String),

    #[error(transparent)]
    Exchange(#[from] snipe_exchange::ExchangeError),

    #[error(transparent)]
    Core(#[from] snipe_core::CoreError),

    #[error("Attempt task failed: {0}")]
    Task(String),
}

/// Result type alias for racing operations.
pub type RacerResult<T> = std::result::Result<T, RacerError>;
