// File: testing-framework/src/orchestrator/clock.rs
//
// Clock Abstraction
//
// Every time-dependent part of the harness (retry backoff, transaction id
// generation, ledger double latency) reads time through this trait so tests
// can drive it deterministically.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{self, Duration, Instant};

/// Wall-clock origin used by [`PausedClock`] (2023-11-14T22:13:20Z).
pub const PAUSED_EPOCH_SECS: u64 = 1_700_000_000;

/// Clock abstraction trait
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use hts_testing_framework::orchestrator::clock::{Clock, PausedClock};
///
/// #[tokio::test]
/// async fn test_with_paused_time() {
///     let clock = Arc::new(PausedClock::new());
///     let start = clock.now();
///     clock.advance(Duration::from_secs(3600)).await;
///     assert_eq!(clock.now() - start, Duration::from_secs(3600));
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current monotonic instant
    fn now(&self) -> Instant;

    /// Returns the time elapsed since the Unix epoch
    ///
    /// Used for transaction valid-start timestamps.
    fn unix_time(&self) -> Duration;

    /// Sleeps for the specified duration
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// System real-time clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn unix_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused clock for tests
///
/// Works with tokio's `time::pause()`: time only moves when advanced
/// explicitly or when the runtime auto-advances an idle paused timer.
/// Wall time starts at [`PAUSED_EPOCH_SECS`] and follows the paused instant.
///
/// Must be created inside a current-thread runtime whose time is not
/// already paused (plain `#[tokio::test]`).
pub struct PausedClock {
    origin: Instant,
}

impl PausedClock {
    /// Creates a new PausedClock and pauses tokio time
    pub fn new() -> Self {
        time::pause();
        Self {
            origin: time::Instant::now(),
        }
    }

    /// Manually advance time by the specified duration
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn unix_time(&self) -> Duration {
        Duration::from_secs(PAUSED_EPOCH_SECS) + (time::Instant::now() - self.origin)
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}
