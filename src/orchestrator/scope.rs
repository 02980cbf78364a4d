//! Lock scopes.

use crate::cluster::HostRole;
use crate::error::{HostLockError, Result};
use std::fmt;
use std::str::FromStr;

/// Which hosts a lock covers.
///
/// Exclusivity on a host is per scope: a compute lock and a storage cell
/// lock never block each other. A forced host list (see
/// `RemoteLock::with_hosts`) only replaces the role lookup; the lock is
/// still taken under the scope's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Compute,
    VirtualMachines,
    StorageCells,
    Switches,
}

impl LockScope {
    /// Scope name passed to the host lock helper.
    pub fn name(&self) -> &'static str {
        match self {
            LockScope::Compute => "default",
            LockScope::VirtualMachines => "vm",
            LockScope::StorageCells => "cell",
            LockScope::Switches => "switch",
        }
    }

    /// Role whose hosts this scope covers.
    pub fn role(&self) -> HostRole {
        match self {
            LockScope::Compute => HostRole::Compute,
            LockScope::VirtualMachines => HostRole::VirtualMachine,
            LockScope::StorageCells => HostRole::StorageCell,
            LockScope::Switches => HostRole::Switch,
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockScope {
    type Err = HostLockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "dom0" | "compute" => Ok(LockScope::Compute),
            "vm" | "domu" => Ok(LockScope::VirtualMachines),
            "cell" => Ok(LockScope::StorageCells),
            "switch" => Ok(LockScope::Switches),
            other => Err(HostLockError::UserError(format!(
                "unknown lock scope '{}' (expected default, vm, cell or switch)",
                other
            ))),
        }
    }
}

/// Sort and de-duplicate a host list.
///
/// Every orchestrator walks hosts in this order. Two operations contending
/// for overlapping host sets therefore can never wait on each other in a
/// cycle.
pub fn canonical_order(mut hosts: Vec<String>) -> Vec<String> {
    hosts.sort();
    hosts.dedup();
    hosts
}
