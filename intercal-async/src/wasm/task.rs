//! WASM local task spawning.
//!
//! `spawn_local` mirrors `tokio::task::spawn_local`: the returned
//! `JoinHandle` is a future yielding the task's output, and `abort()` stops
//! the task at its next suspension point.

use futures::channel::oneshot;
use futures::future::{AbortHandle, Abortable};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// An error returned when a task does not produce a value.
#[derive(Debug, Clone)]
pub struct JoinError {
    _private: (),
}

impl JoinError {
    fn cancelled() -> Self {
        Self { _private: () }
    }

    /// Returns true if the task was aborted before completing.
    pub fn is_cancelled(&self) -> bool {
        true
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task was cancelled")
    }
}

impl std::error::Error for JoinError {}

/// A handle to a spawned local task.
pub struct JoinHandle<T> {
    receiver: oneshot::Receiver<T>,
    abort: AbortHandle,
}

impl<T> JoinHandle<T> {
    /// Aborts the task. Awaiting the handle afterwards yields a `JoinError`.
    pub fn abort(&self) {
        self.abort.abort();
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(output)) => Poll::Ready(Ok(output)),
            // Sender dropped: the task was aborted before sending.
            Poll::Ready(Err(_)) => Poll::Ready(Err(JoinError::cancelled())),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Spawns a `!Send` future on the browser event loop.
pub fn spawn_local<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let (sender, receiver) = oneshot::channel();
    let (abort, registration) = AbortHandle::new_pair();
    let task = Abortable::new(future, registration);

    wasm_bindgen_futures::spawn_local(async move {
        if let Ok(output) = task.await {
            let _ = sender.send(output);
        }
    });

    JoinHandle { receiver, abort }
}

/// Cooperatively yields execution back to the event loop.
pub async fn yield_now() {
    // A 0ms timeout lets other spawned tasks make progress.
    gloo_timers::future::TimeoutFuture::new(0).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn test_spawn_local_returns_value() {
        let handle = spawn_local(async { 42 });
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[wasm_bindgen_test]
    async fn test_spawn_local_non_send_future() {
        let shared = std::rc::Rc::new(std::cell::Cell::new(1));
        let inner = shared.clone();
        let handle = spawn_local(async move {
            inner.set(inner.get() + 1);
            inner.get()
        });

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(shared.get(), 2);
    }

    #[wasm_bindgen_test]
    async fn test_abort_yields_join_error() {
        let handle = spawn_local(async {
            gloo_timers::future::TimeoutFuture::new(50).await;
            1
        });
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
