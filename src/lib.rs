//! Workspace placeholder crate.
//!
//! Re-exports the workspace crates behind the `core` feature so host
//! applications can depend on `intercal-workspace` alone:
//!
//! - [`intercal_core`] items at the crate root (barriers, signals, trees)
//! - the single-threaded runtime helpers as [`runtime`]

#[cfg(feature = "core")]
pub use intercal_core::*;

#[cfg(feature = "core")]
pub use intercal_async as runtime;
