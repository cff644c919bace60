//! Venue error taxonomy.
//!
//! Transport problems, credential problems, and venue business
//! rejections are distinct failure classes and are never conflated
//! with an order that simply did not fill.

use thiserror::Error;

/// Errors from the venue client.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Network-level failure (connect, timeout, TLS). Retryable.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credential or signature failure. Fatal for the whole run.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Venue rejected the request for business reasons.
    #[error("Venue rejection {code}: {message}")]
    Rejected { code: i64, message: String },

    /// The referenced order does not exist or is already terminal.
    #[error("Order not found")]
    OrderNotFound,

    /// Venue asked us to back off.
    #[error("Rate limited")]
    RateLimited,

    /// Non-success HTTP status with an unstructured body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ExchangeError {
    /// Classify a non-success response from the venue.
    ///
    /// Error bodies have the shape `{"code": -1000, "msg": "..."}`.
    pub fn from_api_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i64,
            msg: String,
        }

        if status == 429 {
            return Self::RateLimited;
        }

        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => Self::classify(status, err.code, err.msg),
            Err(_) if status == 401 || status == 403 => {
                Self::Auth(format!("HTTP {status}: {body}"))
            }
            Err(_) => Self::Http {
                status,
                message: body.to_string(),
            },
        }
    }

    fn classify(status: u16, code: i64, message: String) -> Self {
        match code {
            // Bad signature, stale timestamp, bad API key
            -1021 | -1022 | 700002 | 10072 => Self::Auth(message),
            -2011 | -2013 => Self::OrderNotFound,
            _ if status == 401 || status == 403 => Self::Auth(message),
            _ => Self::Rejected { code, message },
        }
    }

    /// Whether the operation may be retried on a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Rejected { code, .. } => matches!(code, -1000 | -1001 | -1016),
            _ => false,
        }
    }

    /// Whether the error means credentials or clocks are broken and
    /// further attempts with the same setup cannot succeed.
    pub fn is_fatal_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias for venue operations.
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
