//! WASM runtime entry point.

use std::future::Future;

/// Runs a future on a `LocalPool`.
///
/// The browser main thread cannot block, so this only completes futures that
/// never wait on browser APIs (timers, fetch, promises). Anything that does
/// hangs forever; keep such code `async` and use `task::spawn_local`.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future + 'static,
    F::Output: 'static,
{
    use futures::executor::LocalPool;

    let mut pool = LocalPool::new();
    pool.run_until(future)
}
