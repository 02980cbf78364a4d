//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for remote host locking.
///
/// This struct represents the contents of `hostlock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    // =========================================================================
    // Lease settings
    // =========================================================================
    /// Seconds between two heartbeat refreshes of a held lease.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Seconds between two reachability probes of a locked host.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Lease validity requested on acquire and refresh.
    /// Must be at least twice `refresh_interval_secs`.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    // =========================================================================
    // Contention settings
    // =========================================================================
    /// First backoff delay while a host is held by a live owner.
    #[serde(default = "default_initial_retry_delay_secs")]
    pub initial_retry_delay_secs: u64,

    /// Backoff cap.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    // =========================================================================
    // Heartbeat worker settings
    // =========================================================================
    /// Polling tick of the heartbeat loop.
    #[serde(default = "default_heartbeat_tick_millis")]
    pub heartbeat_tick_millis: u64,

    /// How long release waits for a cancelled worker before aborting it.
    #[serde(default = "default_worker_join_timeout_secs")]
    pub worker_join_timeout_secs: u64,

    /// Number of forced aborts attempted on a worker that will not stop.
    #[serde(default = "default_kill_retries")]
    pub kill_retries: u32,

    /// Wait after each forced abort.
    #[serde(default = "default_kill_retry_delay_secs")]
    pub kill_retry_delay_secs: u64,

    // =========================================================================
    // Helper script settings
    // =========================================================================
    /// Local path of the host lock helper installed on every host.
    #[serde(default = "default_local_script")]
    pub local_script: String,

    /// Remote directory the helper is installed into.
    #[serde(default = "default_remote_script_dir")]
    pub remote_script_dir: String,

    // =========================================================================
    // Collaborators
    // =========================================================================
    /// JSON file backing the lock ledger. In-memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,

    /// Timeout of a worker status query.
    #[serde(default = "default_worker_status_timeout_secs")]
    pub worker_status_timeout_secs: u64,

    /// Remote executor settings.
    #[serde(default)]
    pub ssh: SshSettings,
}

impl LockConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_secs(self.initial_retry_delay_secs)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_secs)
    }

    pub fn heartbeat_tick(&self) -> Duration {
        Duration::from_millis(self.heartbeat_tick_millis)
    }

    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_join_timeout_secs)
    }

    pub fn kill_retry_delay(&self) -> Duration {
        Duration::from_secs(self.kill_retry_delay_secs)
    }

    pub fn worker_status_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_status_timeout_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
            initial_retry_delay_secs: default_initial_retry_delay_secs(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            heartbeat_tick_millis: default_heartbeat_tick_millis(),
            worker_join_timeout_secs: default_worker_join_timeout_secs(),
            kill_retries: default_kill_retries(),
            kill_retry_delay_secs: default_kill_retry_delay_secs(),
            local_script: default_local_script(),
            remote_script_dir: default_remote_script_dir(),
            ledger_path: None,
            worker_status_timeout_secs: default_worker_status_timeout_secs(),
            ssh: SshSettings::default(),
        }
    }
}
