//! Heartbeat workers.
//!
//! One worker per held host keeps its lease alive. Each worker is an
//! independent tokio task with its own connection; it stops on its own when
//! the host stops answering pings, when the helper script disappears (the
//! lock was removed from outside) or when a refresh is refused. Release
//! cancels it through its [`HeartbeatHandle`] and aborts it if it lingers.

mod handle;
mod worker;


pub use handle::{HeartbeatHandle, StopPolicy};
pub use worker::{HeartbeatExit, HeartbeatSettings, HeartbeatTarget, spawn_heartbeat};
