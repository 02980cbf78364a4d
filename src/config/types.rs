//! Configuration sub-structures and defaults for hostlock.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the ssh/scp based remote executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Remote login user. When unset, ssh's own default applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Extra `-o` style options passed verbatim to ssh and scp.
    #[serde(default = "default_ssh_options")]
    pub options: Vec<String>,

    /// Upper bound for a single remote command.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl SshSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: None,
            options: default_ssh_options(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_refresh_interval_secs() -> u64 {
    5 * 60
}
pub(crate) fn default_ping_interval_secs() -> u64 {
    60
}
pub(crate) fn default_lease_ttl_secs() -> u64 {
    default_refresh_interval_secs() * 2
}
pub(crate) fn default_initial_retry_delay_secs() -> u64 {
    2
}
pub(crate) fn default_max_retry_delay_secs() -> u64 {
    16
}
pub(crate) fn default_heartbeat_tick_millis() -> u64 {
    1000
}
pub(crate) fn default_worker_join_timeout_secs() -> u64 {
    5
}
pub(crate) fn default_kill_retries() -> u32 {
    3
}
pub(crate) fn default_kill_retry_delay_secs() -> u64 {
    5
}
pub(crate) fn default_local_script() -> String {
    "scripts/host_lock.py".to_string()
}
pub(crate) fn default_remote_script_dir() -> String {
    "/opt/hostlock".to_string()
}
pub(crate) fn default_worker_status_timeout_secs() -> u64 {
    10
}
pub(crate) fn default_command_timeout_secs() -> u64 {
    120
}
pub(crate) fn default_ssh_options() -> Vec<String> {
    vec![
        "BatchMode=yes".to_string(),
        "ConnectTimeout=10".to_string(),
    ]
}
