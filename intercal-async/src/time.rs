//! Time-related abstractions.
//!
//! - On native platforms: `tokio::time` and `std::time`
//! - On WASM: `gloo-timers` for sleeping, `performance.now()` for instants,
//!   `Date.now()` for wall-clock timestamps
//!
//! # Examples
//!
//! ```rust
//! use intercal_async::runtime;
//! use intercal_async::time::{sleep, timeout, Duration, Instant};
//!
//! runtime::block_on(async {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//!
//!     let raced = timeout(Duration::from_millis(1), sleep(Duration::from_secs(5))).await;
//!     assert!(raced.is_err());
//! });
//! ```

// ============================================================================
// Native Implementation (Tokio)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::{sleep, timeout, Sleep, Timeout};

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::error::Elapsed as TimeoutError;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant};

// ============================================================================
// WASM Implementation
// ============================================================================

#[cfg(target_arch = "wasm32")]
pub use std::time::Duration;

#[cfg(target_arch = "wasm32")]
/// Sleeps for the specified duration using the browser's `setTimeout`.
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await
}

#[cfg(target_arch = "wasm32")]
/// A monotonic instant backed by `performance.now()`.
///
/// The origin is arbitrary (usually page load).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant {
    millis: u64,
}

#[cfg(target_arch = "wasm32")]
impl Instant {
    /// Returns the current instant.
    ///
    /// Falls back to `Date.now()` when the Performance API is unavailable
    /// (e.g. inside some worker contexts).
    pub fn now() -> Self {
        let millis = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now);
        Self {
            millis: millis as u64,
        }
    }

    /// Returns the amount of time elapsed since this instant.
    pub fn elapsed(&self) -> Duration {
        Self::now().saturating_duration_since(*self)
    }

    /// Returns the duration since an earlier instant, zero if `earlier` is
    /// later than `self`.
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(earlier.millis))
    }

    /// Returns the duration since an earlier instant, or `None` if the
    /// supplied instant is later than `self`.
    pub fn checked_duration_since(&self, earlier: Instant) -> Option<Duration> {
        self.millis
            .checked_sub(earlier.millis)
            .map(Duration::from_millis)
    }
}

#[cfg(target_arch = "wasm32")]
impl std::ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, other: Instant) -> Self::Output {
        self.saturating_duration_since(other)
    }
}

#[cfg(target_arch = "wasm32")]
/// Requires a future to complete before the specified duration has elapsed.
///
/// If the future completes first its output is returned, otherwise
/// `TimeoutError`.
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: std::future::Future,
{
    let sleep_fut = sleep(duration);

    futures::pin_mut!(future);
    futures::pin_mut!(sleep_fut);

    match futures::future::select(future, sleep_fut).await {
        futures::future::Either::Left((output, _)) => Ok(output),
        futures::future::Either::Right(_) => Err(TimeoutError),
    }
}

#[cfg(target_arch = "wasm32")]
/// Error returned when a timeout expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

#[cfg(target_arch = "wasm32")]
impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline has elapsed")
    }
}

#[cfg(target_arch = "wasm32")]
impl std::error::Error for TimeoutError {}

// ============================================================================
// Common Utilities
// ============================================================================

/// Returns the current wall-clock time as milliseconds since the UNIX epoch.
///
/// On WASM `SystemTime::now()` is unavailable, so `Date.now()` is used.
///
/// # Examples
///
/// ```rust
/// use intercal_async::time::now_millis;
///
/// assert!(now_millis() > 0);
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> u64 {
    js_sys::Date::now() as u64
}
