//! Config loading and validation.

use super::model::LockConfig;
use crate::error::{HostLockError, Result};
use std::path::Path;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            HostLockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| HostLockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| HostLockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - every interval must be positive
    /// - `lease_ttl_secs` must be at least twice `refresh_interval_secs`
    /// - `initial_retry_delay_secs` must not exceed `max_retry_delay_secs`
    /// - `remote_script_dir` must be absolute
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("ping_interval_secs", self.ping_interval_secs),
            ("lease_ttl_secs", self.lease_ttl_secs),
            ("initial_retry_delay_secs", self.initial_retry_delay_secs),
            ("heartbeat_tick_millis", self.heartbeat_tick_millis),
            ("ssh.command_timeout_secs", self.ssh.command_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(HostLockError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.lease_ttl_secs < self.refresh_interval_secs.saturating_mul(2) {
            return Err(HostLockError::Config(format!(
                "lease_ttl_secs ({}) must be at least twice refresh_interval_secs ({})",
                self.lease_ttl_secs, self.refresh_interval_secs
            )));
        }

        if self.initial_retry_delay_secs > self.max_retry_delay_secs {
            return Err(HostLockError::Config(format!(
                "initial_retry_delay_secs ({}) must not exceed max_retry_delay_secs ({})",
                self.initial_retry_delay_secs, self.max_retry_delay_secs
            )));
        }

        if !self.remote_script_dir.starts_with('/') {
            return Err(HostLockError::Config(format!(
                "remote_script_dir must be an absolute path (found '{}')",
                self.remote_script_dir
            )));
        }

        Ok(())
    }
}
