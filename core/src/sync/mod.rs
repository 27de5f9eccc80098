//! Synchronization primitives
//!
//! `no_std` alternatives to `std::sync::OnceLock`/`LazyLock`, plus a small
//! mutex-backed `GlobalState<T>` for the one place this crate wants a
//! process-wide singleton (the log service).

pub mod once_lock;

pub use once_lock::{GlobalState, LazyLock, OnceLock};
