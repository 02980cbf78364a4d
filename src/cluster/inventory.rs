//! Static YAML inventory implementation of [`ClusterControl`].

use super::{ClusterControl, HostRole, SessionState};
use crate::error::{HostLockError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Contents of an inventory file.
///
/// ```yaml
/// cluster:
///   uuid: 107be67e-e83e-11eb-8c87-fa163e150850
///   key: clu01
///   name: production-east
/// shared: true
/// hosts:
///   compute: [node02, node01]
///   cell: [cell01]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub cluster: ClusterIdentity,

    #[serde(default = "default_shared")]
    pub shared: bool,

    #[serde(default)]
    pub service_path: Option<String>,

    #[serde(default)]
    pub hosts: InventoryHosts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub uuid: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryHosts {
    pub compute: Vec<String>,
    pub vm: Vec<String>,
    pub cell: Vec<String>,
    pub switch: Vec<String>,
}

fn default_shared() -> bool {
    true
}

impl Inventory {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let inventory: Inventory = serde_yaml::from_str(yaml)
            .map_err(|e| HostLockError::Config(format!("failed to parse inventory YAML: {}", e)))?;

        if inventory.cluster.uuid.trim().is_empty() {
            return Err(HostLockError::Config(
                "inventory cluster.uuid must not be empty".to_string(),
            ));
        }
        Ok(inventory)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HostLockError::Config(format!(
                "failed to read inventory file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn hosts(&self, role: HostRole) -> &[String] {
        match role {
            HostRole::Compute => &self.hosts.compute,
            HostRole::VirtualMachine => &self.hosts.vm,
            HostRole::StorageCell => &self.hosts.cell,
            HostRole::Switch => &self.hosts.switch,
        }
    }
}

/// Cluster controller backed by an [`Inventory`], pinging hosts with the
/// system `ping` binary.
#[derive(Debug)]
pub struct InventoryCluster {
    inventory: Inventory,
    command: Option<String>,
    ping_timeout: Duration,
    last_state: Mutex<SessionState>,
}

impl InventoryCluster {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            command: None,
            ping_timeout: Duration::from_secs(2),
            last_state: Mutex::new(SessionState::Released),
        }
    }

    /// Record the command the lock is taken for.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Last state reported by the orchestrator.
    pub fn last_reported_state(&self) -> SessionState {
        *self
            .last_state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl ClusterControl for InventoryCluster {
    fn is_shared(&self) -> bool {
        self.inventory.shared
    }

    fn cluster_uuid(&self) -> String {
        self.inventory.cluster.uuid.clone()
    }

    fn cluster_key(&self) -> String {
        self.inventory.cluster.key.clone()
    }

    fn cluster_name(&self) -> String {
        self.inventory.cluster.name.clone()
    }

    fn service_path(&self) -> String {
        self.inventory.service_path.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        })
    }

    fn current_command(&self) -> Option<String> {
        self.command.clone()
    }

    async fn hosts_for_role(&self, role: HostRole) -> Result<Vec<String>> {
        Ok(self.inventory.hosts(role).to_vec())
    }

    async fn ping_host(&self, host: &str) -> bool {
        let wait = self.ping_timeout.as_secs().max(1).to_string();
        let status = Command::new("ping")
            .args(["-c", "1", "-W", wait.as_str(), host])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.ping_timeout * 2, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(host, error = %e, "failed to run ping");
                false
            }
            Err(_) => false,
        }
    }

    async fn report_lock_state(&self, state: SessionState) {
        info!(cluster = %self.inventory.cluster.name, %state, "lock state changed");
        *self
            .last_state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = state;
    }
}
