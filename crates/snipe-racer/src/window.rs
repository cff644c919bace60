//! Race window.

use crate::error::{RacerError, RacerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time window in which buy attempts may be launched.
///
/// No submission happens before `arm_at`; no new attempt is launched
/// at or after `expire_at`. Attempts already in flight at expiry are
/// allowed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceWindow {
    arm_at: DateTime<Utc>,
    expire_at: DateTime<Utc>,
}

impl RaceWindow {
    pub fn new(arm_at: DateTime<Utc>, expire_at: DateTime<Utc>) -> RacerResult<Self> {
        if arm_at > expire_at {
            return Err(RacerError::Window(format!(
                "arm time {arm_at} is after expire time {expire_at}"
            )));
        }
        Ok(Self { arm_at, expire_at })
    }

    /// Window opening at `arm_at` and closing `open_ms` later.
    pub fn with_duration_ms(arm_at: DateTime<Utc>, open_ms: u64) -> RacerResult<Self> {
        let expire_at = arm_at + chrono::Duration::milliseconds(open_ms as i64);
        Self::new(arm_at, expire_at)
    }

    pub fn arm_at(&self) -> DateTime<Utc> {
        self.arm_at
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    /// Whether new attempts may still be launched at `now`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.expire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_window_ordering_enforced() {
        assert!(RaceWindow::new(ts(100), ts(200)).is_ok());
        assert!(RaceWindow::new(ts(100), ts(100)).is_ok());
        assert!(RaceWindow::new(ts(200), ts(100)).is_err());
    }

    #[test]
    fn test_is_open_boundary() {
        let window = RaceWindow::new(ts(100), ts(200)).unwrap();
        assert!(window.is_open(ts(100)));
        assert!(window.is_open(ts(199)));
        // Expiry itself is closed
        assert!(!window.is_open(ts(200)));
        assert!(!window.is_open(ts(201)));
    }

    #[test]
    fn test_with_duration() {
        let window = RaceWindow::with_duration_ms(ts(100), 5_000).unwrap();
        assert_eq!(window.expire_at() - window.arm_at(), chrono::Duration::seconds(5));
    }
}
