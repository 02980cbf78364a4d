//! Filesystem utilities for hostlock.
//!
//! Local state (the ledger file) is only ever replaced atomically so a killed
//! process never leaves a truncated document behind.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
