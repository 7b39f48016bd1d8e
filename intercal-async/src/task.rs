//! Local task spawning.
//!
//! intercal primitives are single-threaded, so every task they spawn is a
//! local (`!Send`) task:
//! - On native platforms: `tokio::task::spawn_local` (requires the caller to
//!   run inside `runtime::block_on` or another `LocalSet`)
//! - On WASM: `wasm_bindgen_futures::spawn_local` with an awaitable handle
//!
//! # Examples
//!
//! ```rust
//! use intercal_async::{runtime, task};
//!
//! runtime::block_on(async {
//!     let handle = task::spawn_local(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! });
//! ```

// ============================================================================
// Native Implementation (Tokio)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::task::{yield_now, JoinError, JoinHandle};

#[cfg(not(target_arch = "wasm32"))]
/// Spawns a `!Send` future on the current `LocalSet`.
///
/// # Panics
///
/// Panics when called outside of a `LocalSet` context. `runtime::block_on`
/// and `#[intercal_async::test]` always provide one.
pub fn spawn_local<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + 'static,
    F::Output: 'static,
{
    tokio::task::spawn_local(future)
}

// ============================================================================
// WASM Implementation
// ============================================================================

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::task::{spawn_local, yield_now, JoinError, JoinHandle};

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
