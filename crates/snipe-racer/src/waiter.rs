//! Deadline waiting.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Default sleep increment: 5ms.
pub const DEFAULT_GRANULARITY_MS: u64 = 5;

/// Waits until an absolute timestamp without long blind sleeps.
///
/// Sleeps in bounded increments and re-reads the clock each iteration,
/// so a host clock adjustment mid-wait cannot cause a large overshoot.
/// Returns immediately for targets already in the past.
pub struct DeadlineWaiter {
    clock: Arc<dyn Clock>,
    granularity: Duration,
}

impl DeadlineWaiter {
    pub fn new(clock: Arc<dyn Clock>, granularity_ms: u64) -> Self {
        Self {
            clock,
            granularity: Duration::from_millis(granularity_ms.max(1)),
        }
    }

    /// Wall-clock waiter with the default granularity.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_GRANULARITY_MS)
    }

    /// Sleep until the clock reads at or past `target`.
    pub async fn wait_until(&self, target: DateTime<Utc>) {
        loop {
            let now = self.clock.now();
            if now >= target {
                return;
            }
            let remaining = (target - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(remaining.min(self.granularity)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that advances a fixed step on every read.
    struct SteppingClock {
        base: DateTime<Utc>,
        step_ms: i64,
        reads: AtomicU64,
    }

    impl SteppingClock {
        fn new(base: DateTime<Utc>, step_ms: i64) -> Self {
            Self {
                base,
                step_ms,
                reads: AtomicU64::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) as i64;
            self.base + chrono::Duration::milliseconds(n * self.step_ms)
        }
    }

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_target_returns_immediately() {
        let clock = Arc::new(SteppingClock::new(ts(1_000), 0));
        let waiter = DeadlineWaiter::new(clock.clone(), 5);

        waiter.wait_until(ts(500)).await;

        // One clock read, no sleeping
        assert_eq!(clock.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_returns_before_target() {
        // Each read advances 5ms; target is 20ms out
        let clock = Arc::new(SteppingClock::new(ts(0), 5));
        let waiter = DeadlineWaiter::new(clock.clone(), 5);

        waiter.wait_until(ts(20)).await;

        // Reads at 0, 5, 10, 15 all sleep; the read at 20 returns
        assert_eq!(clock.reads.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rereads_clock_each_iteration() {
        // A clock jump past the target ends the wait on the next poll
        let clock = Arc::new(SteppingClock::new(ts(0), 1_000));
        let waiter = DeadlineWaiter::new(clock.clone(), 5);

        waiter.wait_until(ts(900)).await;

        assert_eq!(clock.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_real_wait_is_not_early() {
        let waiter = DeadlineWaiter::system();
        let target = Utc::now() + chrono::Duration::milliseconds(30);

        waiter.wait_until(target).await;

        assert!(Utc::now() >= target);
    }
}
