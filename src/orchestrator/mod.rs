//! Remote lock orchestrator.
//!
//! [`RemoteLock`] acquires a lease on every host of a [`LockScope`] before a
//! fleet operation and releases them afterwards. Hosts are always walked in
//! sorted order. While a lease is held a heartbeat worker keeps it alive.
//!
//! # Contention
//!
//! When a host reports that another owner holds the scope, the blocking
//! lock is fetched and checked for staleness. Abandoned locks are wiped and
//! the acquire is retried at once; live ones are waited out with exponential
//! backoff. Contention never fails an acquire and has no deadline.
//!
//! # Reentrancy
//!
//! Nested `acquire`/`release` pairs on the same instance only move a
//! counter; remote calls happen on the outermost pair. Methods take
//! `&mut self`, so one instance cannot be driven from two tasks at once.

mod acquire;
mod backoff;
mod cleanup;
mod release;
mod scope;
mod session;


pub use backoff::Backoff;
pub use scope::{LockScope, canonical_order};

use crate::cluster::{ClusterControl, SessionState};
use crate::config::LockConfig;
use crate::error::Result;
use crate::ledger::{LedgerPhase, LedgerRow, LockLedger, MemoryLedger};
use crate::identity::local_hostname;
use crate::protocol::{ExtraInfo, LockMetadata, remote_script_path};
use crate::remote::RemoteExecutor;
use crate::worker_status::{HttpWorkerStatus, WorkerStatusProbe};
use serde::Serialize;
use session::LockSession;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Outcome of a best-effort cleanup over several hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    /// Hosts cleaned up successfully.
    pub removed: Vec<String>,
    /// Hosts that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Distributed advisory lock over a set of hosts.
pub struct RemoteLock {
    cluster: Arc<dyn ClusterControl>,
    executor: Arc<dyn RemoteExecutor>,
    ledger: Arc<dyn LockLedger>,
    worker_status: Arc<dyn WorkerStatusProbe>,
    config: LockConfig,
    local_script: PathBuf,
    worker_port: Option<u16>,
    local_hostname: String,
    pid: u32,
    forced_hosts: Option<Vec<String>>,
    session: LockSession,
}

impl RemoteLock {
    /// Create an orchestrator with an in-memory ledger.
    pub fn new(
        cluster: Arc<dyn ClusterControl>,
        executor: Arc<dyn RemoteExecutor>,
        config: LockConfig,
    ) -> Self {
        let worker_status = HttpWorkerStatus::new(config.worker_status_timeout());
        Self {
            cluster,
            executor,
            ledger: Arc::new(MemoryLedger::new()),
            worker_status: Arc::new(worker_status),
            local_script: PathBuf::from(&config.local_script),
            config,
            worker_port: None,
            local_hostname: local_hostname(),
            pid: std::process::id(),
            forced_hosts: None,
            session: LockSession::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LockLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_worker_status(mut self, probe: Arc<dyn WorkerStatusProbe>) -> Self {
        self.worker_status = probe;
        self
    }

    /// Port of the supervising worker, recorded in lock metadata so other
    /// orchestrators on this machine can check whether we are still alive.
    pub fn with_worker_port(mut self, port: Option<u16>) -> Self {
        self.worker_port = port;
        self
    }

    pub fn with_local_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.local_hostname = hostname.into();
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Lock these hosts instead of the scope's role members.
    ///
    /// The lock keeps the scope's name on each host, so it excludes role
    /// based locks of the same scope on the overlapping hosts.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forced_hosts = Some(canonical_order(hosts.into_iter().map(Into::into).collect()));
        self
    }

    /// Lock owner id: `{cluster uuid}_{pid}`.
    pub fn uuid(&self) -> String {
        format!("{}_{}", self.cluster.cluster_uuid(), self.pid)
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Current `acquire` nesting depth.
    pub fn depth(&self) -> u32 {
        self.session.depth
    }

    /// Hosts with a running heartbeat, sorted.
    pub fn held_hosts(&self) -> Vec<String> {
        self.session.held_hosts()
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire `scope`, run `f`, then release.
    ///
    /// A release failure is reported only when `f` itself succeeded.
    pub async fn run_locked<F, Fut, T>(&mut self, scope: &LockScope, extra: ExtraInfo, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.acquire(scope, extra).await?;
        let result = f().await;
        let released = self.release(scope).await;
        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), released) => {
                if let Err(release_err) = released {
                    warn!(error = %release_err, "release after failed locked operation also failed");
                }
                Err(e)
            }
        }
    }

    /// Hosts covered by `scope`, in canonical order.
    async fn resolve_hosts(&self, scope: &LockScope) -> Result<Vec<String>> {
        let hosts = match &self.forced_hosts {
            Some(hosts) => hosts.clone(),
            None => self.cluster.hosts_for_role(scope.role()).await?,
        };
        Ok(canonical_order(hosts))
    }

    fn script_path(&self, uuid: &str) -> String {
        remote_script_path(&self.config.remote_script_dir, uuid)
    }

    fn metadata_for(&self, host: &str) -> LockMetadata {
        let mut metadata = LockMetadata::new(host)
            .with_owner_hostname(self.local_hostname.clone())
            .with_pid(self.pid)
            .with_worker_port(self.worker_port)
            .with_cluster(self.cluster.cluster_key(), self.cluster.cluster_name())
            .with_service_path(self.cluster.service_path())
            .with_extra(self.session.extra.clone());
        if let Some(command) = self.cluster.current_command() {
            metadata = metadata.with_command(command);
        }
        metadata
    }

    async fn set_state(&mut self, state: SessionState) {
        self.session.state = state;
        self.cluster.report_lock_state(state).await;
    }

    async fn ledger_insert(&self, uuid: &str, phase: LedgerPhase, host: &str) {
        if let Err(e) = self.ledger.insert(LedgerRow::new(uuid, phase, host)).await {
            warn!(host, uuid, %phase, error = %e, "failed to record lock in ledger");
        }
    }

    async fn ledger_delete(&self, uuid: &str, phase: LedgerPhase, host: &str) {
        if let Err(e) = self.ledger.delete(uuid, phase, host).await {
            warn!(host, uuid, %phase, error = %e, "failed to delete lock from ledger");
        }
    }
}
