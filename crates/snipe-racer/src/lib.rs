//! Deadline wait and burst order racing.
//!
//! Waits out the listing moment with a bounded-increment clock watch,
//! then fans out concurrent market-buy attempts in waves until one
//! fills or the race window expires.

pub mod clock;
pub mod error;
pub mod racer;
pub mod waiter;
pub mod window;

pub use clock::{Clock, SystemClock};
pub use error::{RacerError, RacerResult};
pub use racer::{BurstRacer, RaceConfig, RaceOutcome, RaceReport};
pub use waiter::DeadlineWaiter;
pub use window::RaceWindow;
