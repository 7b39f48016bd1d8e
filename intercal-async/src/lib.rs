//! Single-threaded async runtime abstraction for intercal.
//!
//! The coordination primitives in `intercal-core` keep their state in
//! `Rc<RefCell<_>>` and therefore need an executor that runs everything on one
//! thread:
//! - Native platforms: a current-thread Tokio runtime driving a `LocalSet`
//! - WebAssembly: the browser event loop via `wasm-bindgen-futures`
//!
//! # Modules
//!
//! - `runtime`: `block_on` entry point
//! - `task`: local (non-`Send`) task spawning
//! - `time`: sleep, timeout, instants and wall-clock helpers
//! - `sync`: the oneshot channel used for completion hand-off
//!
//! # Examples
//!
//! ```rust
//! use intercal_async::{runtime, task};
//! use intercal_async::time::{sleep, Duration};
//!
//! let value = runtime::block_on(async {
//!     let handle = task::spawn_local(async {
//!         sleep(Duration::from_millis(1)).await;
//!         42
//!     });
//!     handle.await.unwrap()
//! });
//! assert_eq!(value, 42);
//! ```

// Re-export the test attribute so downstream crates never need direct Tokio
// dependencies in their test code.
pub use intercal_async_macros::test;

#[cfg(target_arch = "wasm32")]
pub mod test_support {
    pub use wasm_bindgen_test::wasm_bindgen_test;
}

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use task::spawn_local;
pub use time::{sleep, Duration, Instant};
