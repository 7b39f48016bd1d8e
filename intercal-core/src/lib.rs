//! # intercal
//!
//! Asynchronous coordination helpers for single-threaded code (browser WASM
//! or a native `LocalSet`):
//! - Settle-once and repeatable signals (`signal`)
//! - Join barriers over heterogeneous watched actions (`barrier`, `action`)
//! - Declarative nested signal trees (`tree`)
//!
//! ## Overview
//!
//! A barrier watches a bounded set of actions, locks once the expected
//! number has been added, and settles when a threshold of them completes.
//! Failures are aggregated rather than short-circuiting, and an optional
//! timeout races the whole set.
//!
//! ```rust
//! use intercal_core::{barrier, Once};
//!
//! let fetch_user: Once = Once::new();
//! let fetch_feed: Once = Once::new();
//! let join = barrier::all(vec![fetch_user.clone().into(), fetch_feed.clone().into()], None)?;
//!
//! fetch_user.resolve(vec![]);
//! fetch_feed.resolve(vec![]);
//! assert_eq!(join.outcome(), Some(Ok(())));
//! # Ok::<(), intercal_core::Error>(())
//! ```

pub mod action;
pub mod barrier;
pub mod config;
pub mod error;
pub mod logging;
pub mod signal;
pub mod tree;

pub use action::{Completion, WatchedAction};
pub use barrier::{all, any, any_one, Barrier, BarrierFailure, BarrierPhase, BarrierStatus};
pub use config::BarrierConfig;
pub use error::{Error, Result};
pub use signal::{Args, Event, ListenerId, Once, OnceState};
pub use tree::Intercal;
