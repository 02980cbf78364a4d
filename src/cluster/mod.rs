//! Cluster topology seen by the lock orchestrator.
//!
//! The orchestrator never enumerates hosts itself; it asks a
//! [`ClusterControl`] for the hosts of a role, whether the environment is
//! shared, the cluster identity, and whether a host answers pings. It also
//! reports its [`SessionState`] back so callers can observe lock progress.

mod inventory;


use crate::error::{HostLockError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use inventory::{Inventory, InventoryCluster};

/// Role of a host in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Hypervisor / compute hosts.
    Compute,
    /// Guest virtual machines.
    VirtualMachine,
    /// Storage cells.
    StorageCell,
    /// Network switches.
    Switch,
}

impl HostRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostRole::Compute => "compute",
            HostRole::VirtualMachine => "virtual_machine",
            HostRole::StorageCell => "storage_cell",
            HostRole::Switch => "switch",
        }
    }
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostRole {
    type Err = HostLockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compute" | "dom0" | "default" => Ok(HostRole::Compute),
            "virtual_machine" | "vm" | "domu" => Ok(HostRole::VirtualMachine),
            "storage_cell" | "cell" => Ok(HostRole::StorageCell),
            "switch" => Ok(HostRole::Switch),
            other => Err(HostLockError::UserError(format!(
                "unknown host role '{}' (expected compute, vm, cell or switch)",
                other
            ))),
        }
    }
}

/// Externally observable state of a lock session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Released,
    Acquired,
    Acquiring,
}

impl SessionState {
    /// Numeric code stored alongside requests.
    pub fn code(&self) -> u8 {
        match self {
            SessionState::Released => 0,
            SessionState::Acquired => 1,
            SessionState::Acquiring => 2,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Released => "RELEASED",
            SessionState::Acquired => "ACQUIRED",
            SessionState::Acquiring => "ACQUIRING",
        };
        f.write_str(name)
    }
}

/// Cluster controller consumed by the lock orchestrator.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Whether hosts may be contended by other operations. Locking is
    /// skipped entirely in single-tenant environments.
    fn is_shared(&self) -> bool;

    /// Identifier of the current cluster run; the lock uuid is derived from it.
    fn cluster_uuid(&self) -> String;

    fn cluster_key(&self) -> String;

    fn cluster_name(&self) -> String;

    /// Install path of the service taking locks.
    fn service_path(&self) -> String;

    /// Command being executed, if any.
    fn current_command(&self) -> Option<String>;

    /// Hosts serving `role`, in inventory order.
    async fn hosts_for_role(&self, role: HostRole) -> Result<Vec<String>>;

    /// Liveness probe.
    async fn ping_host(&self, host: &str) -> bool;

    /// Record the session's lock state. Best-effort.
    async fn report_lock_state(&self, state: SessionState);
}
