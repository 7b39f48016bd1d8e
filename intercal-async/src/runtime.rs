//! Runtime utilities that abstract over the underlying executor.
//!
//! On native targets we drive a current-thread Tokio runtime through a
//! `LocalSet` so that `task::spawn_local` works for `!Send` futures. For
//! WebAssembly targets we provide a LocalPool-based implementation.

// ============================================================================
// Native Implementation (Tokio)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::runtime::{Builder, Runtime};

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::task::LocalSet;

/// Runs the provided future to completion on a single thread.
///
/// Local tasks spawned while the future runs are driven by the same
/// `LocalSet`; tasks still pending when the future returns are dropped.
#[cfg(not(target_arch = "wasm32"))]
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("intercal_async::runtime::block_on: failed to build Tokio runtime");
    LocalSet::new().block_on(&runtime, future)
}

// ============================================================================
// WASM Implementation
// ============================================================================

#[cfg(target_arch = "wasm32")]
pub use crate::wasm::runtime::block_on;
