//! # Barrier Configuration
//!
//! A [`BarrierConfig`] describes how many actions a barrier expects, how many
//! completions satisfy it, and how long it may run once locked.
//!
//! ## Fields
//!
//! - `item_count` - number of actions after which the barrier locks itself.
//!   `0` disables auto-lock; call `Barrier::lock` manually.
//! - `wait_completed_count` - completions required to settle. Defaults to
//!   `item_count` (or, in manual mode, to the number of actions at lock).
//! - `timeout` - milliseconds between lock and the timeout outcome. `0`
//!   disables the timeout.
//!
//! ## Usage
//!
//! ```rust
//! use intercal_core::config::BarrierConfig;
//! use std::time::Duration;
//!
//! let config = BarrierConfig::builder()
//!     .item_count(3)
//!     .wait_completed_count(2)
//!     .timeout(Duration::from_secs(5))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.threshold(), Some(2));
//! ```
//!
//! Configs can also be read from JSON, with the timeout in milliseconds:
//!
//! ```rust
//! use intercal_core::config::BarrierConfig;
//!
//! let config: BarrierConfig =
//!     serde_json::from_str(r#"{"itemCount": 2, "timeout": 1500}"#).unwrap();
//! config.validate().unwrap();
//! assert_eq!(config.timeout().unwrap().as_millis(), 1500);
//! ```
//!
//! ## Error Handling
//!
//! Validation fails fast with [`Error::Config`] for configurations that could
//! never settle:
//!
//! ```rust
//! use intercal_core::config::BarrierConfig;
//!
//! let err = BarrierConfig::builder()
//!     .item_count(1)
//!     .wait_completed_count(2)
//!     .build()
//!     .unwrap_err();
//! assert_eq!(err.kind(), "ConfigError");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction parameters for a barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarrierConfig {
    /// Actions expected before auto-lock (0 = lock manually)
    pub item_count: usize,

    /// Completions required to settle (defaults to `item_count`)
    pub wait_completed_count: Option<usize>,

    /// Timeout in milliseconds, counted from lock (0 = no timeout)
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
}

impl BarrierConfig {
    /// Creates a new builder for constructing a `BarrierConfig`.
    pub fn builder() -> BarrierConfigBuilder {
        BarrierConfigBuilder::default()
    }

    /// Manual-lock configuration without timeout.
    pub fn manual() -> Self {
        Self::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - an explicit threshold is at least 1
    /// - the threshold does not exceed `item_count` when auto-lock is on
    pub fn validate(&self) -> Result<()> {
        if let Some(wait) = self.wait_completed_count {
            if wait == 0 {
                return Err(Error::Config(
                    "waitCompletedCount must be at least 1".to_string(),
                ));
            }

            if self.item_count > 0 && wait > self.item_count {
                return Err(Error::Config(format!(
                    "waitCompletedCount ({}) exceeds itemCount ({}); the barrier could never settle",
                    wait, self.item_count
                )));
            }
        }

        Ok(())
    }

    /// The timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Completions required to settle, when known before lock.
    ///
    /// Returns `None` in manual mode without an explicit threshold; the
    /// barrier then waits for every action present at lock time.
    pub fn threshold(&self) -> Option<usize> {
        match (self.wait_completed_count, self.item_count) {
            (Some(wait), _) => Some(wait),
            (None, 0) => None,
            (None, items) => Some(items),
        }
    }

    /// Whether the barrier locks itself once `item_count` actions are added.
    pub fn auto_locks(&self) -> bool {
        self.item_count > 0
    }
}

/// Builder for [`BarrierConfig`].
#[derive(Debug, Default)]
pub struct BarrierConfigBuilder {
    item_count: usize,
    wait_completed_count: Option<usize>,
    timeout: Option<Duration>,
}

impl BarrierConfigBuilder {
    /// Sets the number of actions after which the barrier locks itself.
    pub fn item_count(mut self, count: usize) -> Self {
        self.item_count = count;
        self
    }

    /// Sets the number of completions that settle the barrier.
    pub fn wait_completed_count(mut self, count: usize) -> Self {
        self.wait_completed_count = Some(count);
        self
    }

    /// Sets the timeout, counted from lock. A zero duration disables it;
    /// any other duration is kept at millisecond resolution, at least 1 ms.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets or clears the timeout from optional input.
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the threshold is zero or larger than
    /// `item_count` (with auto-lock on).
    pub fn build(self) -> Result<BarrierConfig> {
        let config = BarrierConfig {
            item_count: self.item_count,
            wait_completed_count: self.wait_completed_count,
            timeout_ms: self.timeout.map(timeout_millis).unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Whole milliseconds for a timeout, saturating at `u64::MAX`.
///
/// Sub-millisecond timeouts round up to 1 ms so they stay enabled.
fn timeout_millis(timeout: Duration) -> u64 {
    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !timeout.is_zero() {
        1
    } else {
        millis
    }
}
