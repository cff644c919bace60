//! Take-profit monitoring and liquidation.
//!
//! Each held position gets one detached monitor task that polls the
//! ticker until the take-profit target is crossed, then market-sells
//! the full quantity and confirms settlement.

pub mod monitor;
pub mod target;

pub use monitor::{
    spawn_monitor, AbortReason, MonitorConfig, MonitorHandle, MonitorOutcome, MonitorPhase,
};
pub use target::TakeProfitTarget;
