//! Browser implementations of the runtime abstraction.
//!
//! Everything here is single-threaded: futures are `'static` but never
//! `Send`, spawned tasks run on the browser event loop through
//! `wasm_bindgen_futures::spawn_local`, and `block_on` uses a
//! `futures::executor::LocalPool` for immediately-ready work.

pub mod runtime;
pub mod task;
