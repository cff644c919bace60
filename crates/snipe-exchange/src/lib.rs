//! Signed REST access to the spot venue.
//!
//! Provides the authenticated `ExchangeClient` (order submission, query,
//! cancellation, ticker and balance reads) and the `ExchangeApi` trait the
//! racing and monitoring layers are written against.

pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod responses;
pub mod signer;

pub use api::{ExchangeApi, MarketAmount};
pub use client::ExchangeClient;
pub use credentials::Credentials;
pub use error::{ExchangeError, ExchangeResult};
pub use responses::AssetBalance;
pub use signer::Signer;
