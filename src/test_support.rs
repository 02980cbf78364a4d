//! In-memory fleet used by the unit tests.
//!
//! `FakeFleet` keeps per-host files and leases and answers helper
//! invocations with the same exit codes a real host would. Lease expiry uses
//! tokio's clock, so tests running with a paused clock can fast-forward
//! through refresh intervals and TTLs.

use crate::cluster::{ClusterControl, HostRole, SessionState};
use crate::config::LockConfig;
use crate::error::{HostLockError, Result};
use crate::protocol::{HlpRequest, InfoTarget, LockMetadata};
use crate::remote::{CommandOutput, RemoteExecutor, RemoteNode};
use crate::worker_status::{WorkerStatus, WorkerStatusProbe};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// A lease granted by a fake host.
#[derive(Debug, Clone)]
pub(crate) struct FakeLease {
    pub uuid: String,
    pub expires_at: Instant,
    pub info: LockMetadata,
}

#[derive(Debug, Default)]
struct FakeHost {
    files: HashMap<String, Vec<u8>>,
    leases: BTreeMap<String, FakeLease>,
    legacy: Option<FakeLease>,
    /// Forced exit codes keyed by helper subcommand.
    overrides: HashMap<&'static str, i32>,
    down: bool,
}

/// One helper invocation seen by the fleet.
#[derive(Debug, Clone)]
pub(crate) struct FleetCall {
    pub host: String,
    pub at: Instant,
    pub request: HlpRequest,
    pub exit_code: i32,
}

#[derive(Debug, Default)]
struct FleetState {
    hosts: BTreeMap<String, FakeHost>,
    calls: Vec<FleetCall>,
}

/// Shared state of every fake host.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFleet {
    state: Arc<Mutex<FleetState>>,
}

impl FakeFleet {
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fleet = Self::default();
        {
            let mut state = lock(&fleet.state);
            for host in hosts {
                state.hosts.insert(host.into(), FakeHost::default());
            }
        }
        fleet
    }

    /// Connects through this fleet.
    pub fn executor(&self) -> Arc<FakeExecutor> {
        Arc::new(FakeExecutor {
            fleet: self.clone(),
        })
    }

    /// Make `host` refuse connections and commands.
    pub fn set_down(&self, host: &str, down: bool) {
        lock(&self.state).hosts.entry(host.to_string()).or_default().down = down;
    }

    /// Force every `subcommand` call on `host` to exit with `code`.
    pub fn override_code(&self, host: &str, subcommand: &'static str, code: i32) {
        lock(&self.state)
            .hosts
            .entry(host.to_string())
            .or_default()
            .overrides
            .insert(subcommand, code);
    }

    pub fn clear_override(&self, host: &str, subcommand: &'static str) {
        if let Some(h) = lock(&self.state).hosts.get_mut(host) {
            h.overrides.remove(subcommand);
        }
    }

    /// Plant a lease as if another orchestrator had acquired it.
    pub fn plant_lease(&self, host: &str, scope: &str, info: LockMetadata, ttl: Duration) {
        let lease = FakeLease {
            uuid: info.owner_uuid.clone().unwrap_or_default(),
            expires_at: Instant::now() + ttl,
            info,
        };
        lock(&self.state)
            .hosts
            .entry(host.to_string())
            .or_default()
            .leases
            .insert(scope.to_string(), lease);
    }

    /// Plant an unscoped lock written by an older helper.
    pub fn plant_legacy_lease(&self, host: &str, info: LockMetadata, ttl: Duration) {
        let lease = FakeLease {
            uuid: info.owner_uuid.clone().unwrap_or_default(),
            expires_at: Instant::now() + ttl,
            info,
        };
        lock(&self.state).hosts.entry(host.to_string()).or_default().legacy = Some(lease);
    }

    /// Lease currently recorded for `(host, scope)`, expired or not.
    pub fn lease(&self, host: &str, scope: &str) -> Option<FakeLease> {
        lock(&self.state)
            .hosts
            .get(host)
            .and_then(|h| h.leases.get(scope).cloned())
    }

    /// Uuid holding a valid lease on `(host, scope)`.
    pub fn holder(&self, host: &str, scope: &str) -> Option<String> {
        let now = Instant::now();
        self.lease(host, scope)
            .filter(|l| l.expires_at > now)
            .map(|l| l.uuid)
    }

    pub fn has_file(&self, host: &str, path: &str) -> bool {
        lock(&self.state)
            .hosts
            .get(host)
            .is_some_and(|h| h.files.contains_key(path))
    }

    pub fn files(&self, host: &str) -> Vec<String> {
        let state = lock(&self.state);
        let mut files: Vec<String> = state
            .hosts
            .get(host)
            .map(|h| h.files.keys().cloned().collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    /// Delete a file as an operator on the host would.
    pub fn remove_file(&self, host: &str, path: &str) {
        if let Some(h) = lock(&self.state).hosts.get_mut(host) {
            h.files.remove(path);
        }
    }

    pub fn write_file(&self, host: &str, path: &str, contents: &[u8]) {
        lock(&self.state)
            .hosts
            .entry(host.to_string())
            .or_default()
            .files
            .insert(path.to_string(), contents.to_vec());
    }

    pub fn calls(&self) -> Vec<FleetCall> {
        lock(&self.state).calls.clone()
    }

    /// `(host, subcommand)` of every helper call, in order.
    pub fn call_log(&self) -> Vec<(String, &'static str)> {
        self.calls()
            .into_iter()
            .map(|c| (c.host, c.request.subcommand()))
            .collect()
    }

    /// Hosts `subcommand` ran on, in order.
    pub fn hosts_for(&self, subcommand: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.request.subcommand() == subcommand)
            .map(|c| c.host)
            .collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.hosts_for(subcommand).len()
    }

    fn exec(&self, host: &str, command: &str) -> Result<CommandOutput> {
        let mut state = lock(&self.state);
        let node = state
            .hosts
            .get_mut(host)
            .ok_or_else(|| HostLockError::transport(host, "unknown host"))?;
        if node.down {
            return Err(HostLockError::transport(host, "connection refused"));
        }

        if command == "true" || command.starts_with("/bin/mkdir -p ") {
            return Ok(CommandOutput::new(0, "", ""));
        }
        if let Some(path) = command.strip_prefix("chmod 755 ") {
            let path = unquote(path);
            let code = if node.files.contains_key(&path) { 0 } else { 1 };
            return Ok(CommandOutput::new(code, "", ""));
        }
        if let Some(path) = command.strip_prefix("/bin/rm -f ") {
            node.files.remove(&unquote(path));
            return Ok(CommandOutput::new(0, "", ""));
        }

        let (script, request) = HlpRequest::parse(command)?;
        if !node.files.contains_key(&script) {
            return Ok(CommandOutput::new(127, "", format!("{}: not found", script)));
        }

        let output = match node.overrides.get(request.subcommand()) {
            Some(&code) => CommandOutput::new(code, "", "forced failure"),
            None => apply(node, &request)?,
        };
        state.calls.push(FleetCall {
            host: host.to_string(),
            at: Instant::now(),
            request,
            exit_code: output.exit_code,
        });
        Ok(output)
    }
}

fn unquote(word: &str) -> String {
    shell_words::split(word)
        .ok()
        .and_then(|w| w.into_iter().next())
        .unwrap_or_else(|| word.to_string())
}

fn lease_json(lease: &FakeLease) -> Result<String> {
    lease.info.to_json()
}

fn grant(info: LockMetadata, uuid: &str, valid_for_secs: u64) -> FakeLease {
    let mut info = info;
    info.owner_uuid = Some(uuid.to_string());
    info.acquire_date = Some(chrono::Utc::now().to_rfc3339());
    info.expire_date = Some(
        (chrono::Utc::now() + chrono::Duration::seconds(valid_for_secs as i64)).to_rfc3339(),
    );
    FakeLease {
        uuid: uuid.to_string(),
        expires_at: Instant::now() + Duration::from_secs(valid_for_secs),
        info,
    }
}

fn apply(node: &mut FakeHost, request: &HlpRequest) -> Result<CommandOutput> {
    let now = Instant::now();
    let ok = || CommandOutput::new(0, "", "");

    Ok(match request {
        HlpRequest::Acquire {
            lock_info,
            valid_for_secs,
            scope,
            uuid,
        } => {
            let info = LockMetadata::from_base64(lock_info)?;
            if let Some(legacy) = &node.legacy
                && legacy.expires_at > now
            {
                return Ok(CommandOutput::new(3, "", "blocked by legacy lock"));
            }
            match node.leases.get(scope) {
                Some(held) if held.uuid != *uuid && held.expires_at > now => {
                    CommandOutput::new(2, "", "lock held")
                }
                Some(held) if held.uuid != *uuid => {
                    let previous = lease_json(held)?;
                    node.leases
                        .insert(scope.clone(), grant(info, uuid, *valid_for_secs));
                    CommandOutput::new(4, "", previous)
                }
                _ => {
                    node.leases
                        .insert(scope.clone(), grant(info, uuid, *valid_for_secs));
                    ok()
                }
            }
        }
        HlpRequest::Refresh {
            valid_for_secs,
            scope,
            uuid,
        } => match node.leases.get_mut(scope) {
            Some(held) if held.uuid == *uuid && held.expires_at > now => {
                held.expires_at = now + Duration::from_secs(*valid_for_secs);
                ok()
            }
            _ => CommandOutput::new(5, "", "no lock to refresh"),
        },
        HlpRequest::Release { scope, uuid } => match node.leases.get(scope) {
            Some(held) if held.uuid == *uuid => {
                node.leases.remove(scope);
                ok()
            }
            _ => CommandOutput::new(5, "", "no lock to release"),
        },
        HlpRequest::GetInfo(InfoTarget::Scope(scope)) => match node.leases.get(scope) {
            Some(held) => CommandOutput::new(0, lease_json(held)?, ""),
            None => CommandOutput::new(5, "", "no lock"),
        },
        HlpRequest::GetInfo(InfoTarget::Legacy) => match &node.legacy {
            Some(held) => CommandOutput::new(0, lease_json(held)?, ""),
            None => CommandOutput::new(5, "", "no legacy lock"),
        },
        HlpRequest::RemoveAll => {
            node.leases.clear();
            node.legacy = None;
            ok()
        }
    })
}

/// [`RemoteExecutor`] over a [`FakeFleet`].
pub(crate) struct FakeExecutor {
    fleet: FakeFleet,
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn connect(&self, host: &str) -> Result<Box<dyn RemoteNode>> {
        self.fleet.exec(host, "true")?;
        Ok(Box::new(FakeNode {
            host: host.to_string(),
            fleet: self.fleet.clone(),
        }))
    }
}

pub(crate) struct FakeNode {
    host: String,
    fleet: FakeFleet,
}

#[async_trait]
impl RemoteNode for FakeNode {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.fleet.exec(&self.host, command)
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let bytes = std::fs::read(local_path)
            .map_err(|e| HostLockError::UserError(e.to_string()))?;
        self.fleet.exec(&self.host, "true")?;
        self.fleet.write_file(&self.host, remote_path, &bytes);
        Ok(())
    }

    async fn file_exists(&self, remote_path: &str) -> Result<bool> {
        self.fleet.exec(&self.host, "true")?;
        Ok(self.fleet.has_file(&self.host, remote_path))
    }

    async fn sha256(&self, remote_path: &str) -> Result<Option<String>> {
        self.fleet.exec(&self.host, "true")?;
        let state = lock(&self.fleet.state);
        Ok(state
            .hosts
            .get(&self.host)
            .and_then(|h| h.files.get(remote_path))
            .map(|bytes| format!("{:x}", Sha256::digest(bytes))))
    }
}

/// [`ClusterControl`] with settable topology and reachability.
pub(crate) struct FakeCluster {
    uuid: String,
    shared: Mutex<bool>,
    roles: Mutex<HashMap<HostRole, Vec<String>>>,
    unreachable: Mutex<HashSet<String>>,
    states: Mutex<Vec<SessionState>>,
}

impl FakeCluster {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            shared: Mutex::new(true),
            roles: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
            states: Mutex::new(Vec::new()),
        }
    }

    pub fn with_role<I, S>(self, role: HostRole, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.roles).insert(role, hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_shared(&self, shared: bool) {
        *lock(&self.shared) = shared;
    }

    pub fn set_reachable(&self, host: &str, reachable: bool) {
        let mut unreachable = lock(&self.unreachable);
        if reachable {
            unreachable.remove(host);
        } else {
            unreachable.insert(host.to_string());
        }
    }

    /// Every state reported so far.
    pub fn reported_states(&self) -> Vec<SessionState> {
        lock(&self.states).clone()
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
    fn is_shared(&self) -> bool {
        *lock(&self.shared)
    }

    fn cluster_uuid(&self) -> String {
        self.uuid.clone()
    }

    fn cluster_key(&self) -> String {
        "key-1".to_string()
    }

    fn cluster_name(&self) -> String {
        "cluster-1".to_string()
    }

    fn service_path(&self) -> String {
        "/srv/service".to_string()
    }

    fn current_command(&self) -> Option<String> {
        Some("patch".to_string())
    }

    async fn hosts_for_role(&self, role: HostRole) -> Result<Vec<String>> {
        Ok(lock(&self.roles).get(&role).cloned().unwrap_or_default())
    }

    async fn ping_host(&self, host: &str) -> bool {
        !lock(&self.unreachable).contains(host)
    }

    async fn report_lock_state(&self, state: SessionState) {
        lock(&self.states).push(state);
    }
}

/// [`WorkerStatusProbe`] answering from a fixed table.
#[derive(Default)]
pub(crate) struct FakeWorkerStatus {
    workers: Mutex<HashMap<u16, WorkerStatus>>,
}

impl FakeWorkerStatus {
    pub fn set_running(&self, port: u16, uuid: &str) {
        lock(&self.workers).insert(port, WorkerStatus::running(uuid));
    }

    pub fn stop(&self, port: u16) {
        lock(&self.workers).remove(&port);
    }
}

#[async_trait]
impl WorkerStatusProbe for FakeWorkerStatus {
    async fn status(&self, port: u16) -> Option<WorkerStatus> {
        lock(&self.workers).get(&port).cloned()
    }
}

/// Local helper script plus a config pointing at it.
pub(crate) struct TestScript {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestScript {
    pub fn new() -> Self {
        Self::with_contents("#!/bin/sh\n# host lock helper\n")
    }

    pub fn with_contents(contents: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host_lock.py");
        std::fs::write(&path, contents).unwrap();
        Self { _dir: dir, path }
    }

    /// Defaults with the helper path filled in.
    pub fn config(&self) -> LockConfig {
        LockConfig {
            local_script: self.path.to_string_lossy().to_string(),
            ..LockConfig::default()
        }
    }
}
