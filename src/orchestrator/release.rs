//! Release path.

use super::{LockScope, RemovalReport, RemoteLock};
use crate::cluster::SessionState;
use crate::error::{HostLockError, Result};
use crate::heartbeat::StopPolicy;
use crate::ledger::LedgerPhase;
use crate::protocol::{HostLockClient, LockRetCode};
use tracing::{debug, error, info, warn};

impl RemoteLock {
    /// Release `scope` once the outermost `acquire` is matched.
    ///
    /// The first host whose release fails ends the loop; that host may keep
    /// its lease until it expires. Heartbeats of every held host are stopped
    /// either way.
    pub async fn release(&mut self, scope: &LockScope) -> Result<()> {
        if !self.cluster.is_shared() {
            info!("single-tenant environment detected, skipping remote unlocking");
            return Ok(());
        }

        if self.session.depth == 0 {
            error!("trying to release an unacquired lock, aborting");
            return Err(HostLockError::NotAcquired);
        }
        self.session.depth -= 1;

        let uuid = self.uuid();
        if self.session.depth > 0 {
            info!(uuid, "releasing nested remote lock, no-op");
            return Ok(());
        }

        let result = self.release_all(scope, &uuid).await;

        info!(uuid, "waiting for heartbeat workers to stop");
        self.stop_workers(StopPolicy::from(&self.config)).await;
        self.session.scope = None;
        self.set_state(SessionState::Released).await;

        result
    }

    async fn release_all(&mut self, scope: &LockScope, uuid: &str) -> Result<()> {
        let hosts = match self.resolve_hosts(scope).await {
            Ok(hosts) => hosts,
            Err(e) => return Err(release_error(scope, uuid, Vec::new(), e)),
        };
        info!(uuid, scope = scope.name(), ?hosts, "releasing remote lock");

        let total = hosts.len();
        for (index, host) in hosts.iter().enumerate() {
            if let Err(e) = self.release_host(host, scope.name(), uuid).await {
                error!(uuid, host, error = %e, "remote lock release failed");
                return Err(release_error(scope, uuid, hosts.clone(), e));
            }

            if let Some(handle) = self.session.workers.remove(host.as_str())
                && let Err(e) = handle.stop(StopPolicy::from(&self.config)).await
            {
                warn!(host, error = %e, "failed to stop heartbeat worker");
            }
            self.ledger_delete(uuid, LedgerPhase::Acquired, host).await;
            debug!(host, uuid, "partial remote lock released, {} out of {}", index + 1, total);
        }

        info!(uuid, "full remote lock released");
        Ok(())
    }

    /// Force-release everything this session holds, whatever the nesting
    /// depth. Meant for cleanup at the end of exceptional control flow.
    pub async fn clear(&mut self, scope: &LockScope) -> Result<()> {
        if self.session.depth == 0 {
            return Ok(());
        }
        self.session.depth = 1;
        self.release(scope).await
    }

    /// Release a lock held by `uuid`, typically left behind by a crashed
    /// run. Never fails: problems are logged and the next host is tried.
    pub async fn release_unowned(&mut self, uuid: &str, scope: &LockScope) -> RemovalReport {
        let mut report = RemovalReport::default();
        if !self.cluster.is_shared() {
            info!("single-tenant environment detected, skipping remote unlocking");
            return report;
        }

        let hosts = match self.resolve_hosts(scope).await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!(uuid, error = %e, "could not resolve hosts, manual cleanup may be required");
                return report;
            }
        };
        info!(uuid, scope = scope.name(), ?hosts, "releasing unowned remote lock");

        for host in hosts {
            match self.release_host(&host, scope.name(), uuid).await {
                Ok(_) => {
                    self.ledger_delete(uuid, LedgerPhase::Acquired, &host).await;
                    info!(host, uuid, "unowned remote lock released");
                    report.removed.push(host);
                }
                Err(e) => {
                    error!(
                        host,
                        uuid,
                        error = %e,
                        "unowned remote lock release failed, manual cleanup may be required"
                    );
                    report.failed.push((host, e.to_string()));
                }
            }
        }
        report
    }

    /// Release `uuid`'s lease on one host and delete its helper copy.
    ///
    /// A lease that is already gone counts as released.
    pub(super) async fn release_host(&self, host: &str, scope: &str, uuid: &str) -> Result<LockRetCode> {
        let node = self.executor.connect(host).await?;
        let client = HostLockClient::new(node.as_ref(), self.script_path(uuid));
        client.ensure_installed(&self.local_script).await?;

        let outcome = client.release(scope, uuid).await?;
        // The helper copy is unique to the uuid.
        client.uninstall().await?;

        if !outcome.code.is_released() {
            return Err(HostLockError::protocol(
                host,
                format!(
                    "release of {} for {} failed unexpectedly: {}",
                    scope,
                    uuid,
                    outcome.describe()
                ),
            ));
        }
        Ok(outcome.code)
    }

    /// Stop every tracked heartbeat worker.
    pub(super) async fn stop_workers(&mut self, policy: StopPolicy) {
        for handle in self.session.take_workers() {
            let host = handle.host().to_string();
            match handle.stop(policy).await {
                Ok(exit) => debug!(host, ?exit, "heartbeat worker stopped"),
                Err(e) => warn!(host, error = %e, "failed to stop heartbeat worker"),
            }
        }
    }
}

fn release_error(scope: &LockScope, uuid: &str, hosts: Vec<String>, source: HostLockError) -> HostLockError {
    HostLockError::Release {
        scope: scope.name().to_string(),
        uuid: uuid.to_string(),
        hosts,
        source: Box::new(source),
    }
}
