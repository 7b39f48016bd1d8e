//! Synchronization primitives.
//!
//! Only the oneshot channel is needed by intercal: it hands a single outcome
//! from a callback-driven primitive to an awaiting task.
//!
//! - On native platforms: `tokio::sync::oneshot`
//! - On WASM: `futures::channel::oneshot`
//!
//! Both receivers are futures resolving to `Result<T, _>`, so callers only
//! match on `Ok`/`Err` and stay platform independent.
//!
//! # Examples
//!
//! ```rust
//! use intercal_async::{runtime, sync::oneshot};
//!
//! runtime::block_on(async {
//!     let (tx, rx) = oneshot::channel();
//!     tx.send(7).unwrap();
//!     assert_eq!(rx.await.unwrap(), 7);
//! });
//! ```

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::sync::oneshot;

#[cfg(target_arch = "wasm32")]
pub use futures::channel::oneshot;
