//! Core domain types for the listing sniper.
//!
//! This crate provides fundamental types used throughout the sniper:
//! - `Price`, `Quantity`: Precision-safe numeric types
//! - `Order`, `Fill`: Exchange order state and realized fills
//! - `OrderSide`, `OrderKind`, `OrderStatus`: Trading enums

pub mod decimal;
pub mod error;
pub mod order;

pub use decimal::{Price, Quantity};
pub use error::{CoreError, Result};
pub use order::{ClientOrderId, Fill, Order, OrderId, OrderKind, OrderSide, OrderStatus};
