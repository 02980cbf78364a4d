//! hostlock: lease-based advisory locks across a fleet of hosts.
//!
//! Before a fleet operation touches a set of hosts, [`RemoteLock`] acquires a
//! per-scope lease on each of them through a small helper executed on the
//! host, in sorted host order so overlapping operations cannot deadlock.
//! Heartbeat workers keep the leases alive, a staleness check reclaims locks
//! whose owner is gone, and release undoes it all.
//!
//! [`RemoteLock`]: orchestrator::RemoteLock

pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod heartbeat;
pub mod identity;
pub mod ledger;
pub mod orchestrator;
pub mod protocol;
pub mod remote;
pub mod staleness;
pub mod worker_status;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{HostLockError, Result};
pub use orchestrator::{LockScope, RemoteLock, RemovalReport};
