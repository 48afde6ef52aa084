//! Bounded polling.
//!
//! The portal renders asynchronously, so every "wait for X" in the booking
//! flow is a check polled on an interval until it yields a value or the
//! deadline passes. Timing uses `tokio::time`, which lets tests run with a
//! paused clock.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::result::{BookingError, BookingResult};

/// Default timeout for element waits (45 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 45_000;

/// Default timeout for dropdown options to render (3 seconds)
pub const DEFAULT_OPTION_TIMEOUT_MS: u64 = 3_000;

/// Default poll interval (250 ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Options for a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Probe this often
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitOptions {
    /// Create with a timeout and the default poll interval
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Create with a timeout in milliseconds
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Timeout in whole milliseconds
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Poll `check` until it returns `Some`, or fail with [`BookingError::Timeout`].
///
/// The check runs at least once, even with a zero timeout. Errors from the
/// check end the wait immediately. A timeout too large to represent as a
/// deadline waits without one.
pub async fn poll_until<T, F, Fut>(options: &WaitOptions, what: &str, mut check: F) -> BookingResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BookingResult<Option<T>>>,
{
    let deadline = Instant::now().checked_add(options.timeout);
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(BookingError::Timeout {
                    ms: options.timeout_ms(),
                    what: what.to_string(),
                });
            }
            Some(deadline) => options.poll_interval.min(deadline - now),
            None => options.poll_interval,
        };
        tokio::time::sleep(pause).await;
    }
}
