//! Lock metadata exchanged with the host lock helper.

use crate::error::{HostLockError, Result};
use crate::identity::{local_hostname, owner_user_name};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Caller-supplied fields describing why a lock is held.
pub type ExtraInfo = BTreeMap<String, Value>;

/// Uuid reported when a lock record carries none.
pub(crate) const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Lock metadata sent on acquire and returned verbatim by `get-info`.
///
/// The host stores the document opaquely and adds the `owner_uuid`,
/// `acquire_date` and `expire_date` fields of the lease it granted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Local user running the orchestrator.
    #[serde(default)]
    pub owner_user_name: String,

    /// Machine running the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_hostname: Option<String>,

    /// Process id of the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Port of the local supervising worker, used for liveness checks.
    #[serde(
        default,
        deserialize_with = "port_from_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub worker_port: Option<u16>,

    #[serde(default)]
    pub cluster_key: String,

    #[serde(default)]
    pub cluster_name: String,

    /// Install path of the service holding the lock.
    #[serde(default)]
    pub service_path: String,

    /// Host the lock was requested on.
    #[serde(default)]
    pub target_host: String,

    /// Command that triggered the lock, a hint of how long it may be held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<ExtraInfo>,

    // Filled in by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquire_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<String>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl LockMetadata {
    /// Create metadata for a lock on `target_host` owned by this process.
    pub fn new(target_host: impl Into<String>) -> Self {
        Self {
            owner_user_name: owner_user_name(),
            owner_hostname: Some(local_hostname()),
            pid: Some(std::process::id()),
            target_host: target_host.into(),
            ..Self::default()
        }
    }

    pub fn with_owner_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.owner_hostname = Some(hostname.into());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_worker_port(mut self, port: Option<u16>) -> Self {
        self.worker_port = port;
        self
    }

    pub fn with_cluster(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.cluster_key = key.into();
        self.cluster_name = name.into();
        self
    }

    pub fn with_service_path(mut self, path: impl Into<String>) -> Self {
        self.service_path = path.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attach caller fields; an empty map leaves `extra_info` unset.
    pub fn with_extra(mut self, extra: ExtraInfo) -> Self {
        self.extra_info = (!extra.is_empty()).then_some(extra);
        self
    }

    /// Owner uuid without the process suffix.
    ///
    /// Lock uuids are `{run uuid}_{pid}`; liveness checks compare the run part
    /// only. A record without an owner reads as the nil uuid.
    pub fn owner_run_uuid(&self) -> &str {
        run_uuid(self.owner_uuid.as_deref().unwrap_or(NIL_UUID))
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            HostLockError::UserError(format!("failed to serialize lock metadata: {}", e))
        })
    }

    /// Serialize to pretty JSON for logs.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            HostLockError::UserError(format!("failed to parse lock metadata: {}", e))
        })
    }

    /// Encode as the base64 JSON blob passed to `acquire --lock-info`.
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?.as_bytes()))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded).map_err(|e| {
            HostLockError::UserError(format!("lock metadata is not valid base64: {}", e))
        })?;
        let json = String::from_utf8(bytes).map_err(|e| {
            HostLockError::UserError(format!("lock metadata is not valid UTF-8: {}", e))
        })?;
        Self::from_json(&json)
    }
}

/// Run part of a `{run uuid}_{pid}` lock uuid.
pub(crate) fn run_uuid(uuid: &str) -> &str {
    uuid.split('_').next().unwrap_or(uuid)
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
