//! Configuration model for hostlock.
//!
//! This module defines the `LockConfig` struct loaded from `hostlock.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of lease timings.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::LockConfig;
pub use types::SshSettings;
