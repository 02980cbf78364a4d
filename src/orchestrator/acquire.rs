//! Acquire path.

use super::backoff::Backoff;
use super::{LockScope, RemoteLock};
use crate::cluster::SessionState;
use crate::error::{HostLockError, Result};
use crate::heartbeat::{HeartbeatSettings, HeartbeatTarget, StopPolicy, spawn_heartbeat};
use crate::ledger::LedgerPhase;
use crate::protocol::{ExtraInfo, HostLockClient, InfoTarget, LockRetCode};
use crate::remote::RemoteNode;
use crate::staleness::{Staleness, StalenessDetector};
use tracing::{debug, error, info, warn};

impl RemoteLock {
    /// Acquire `scope` on every host it covers.
    ///
    /// `extra` is attached to the lock metadata as `extra_info`. Nested calls
    /// only bump the depth counter. Blocks for as long as another live owner
    /// holds any of the hosts.
    pub async fn acquire(&mut self, scope: &LockScope, extra: ExtraInfo) -> Result<()> {
        if !self.cluster.is_shared() {
            info!("single-tenant environment detected, skipping remote locking");
            return Ok(());
        }

        let uuid = self.uuid();
        let hosts = self.resolve_hosts(scope).await?;

        if self.session.depth > 0 {
            info!(uuid, ?hosts, "acquiring nested remote lock, no-op");
            self.session.depth += 1;
            return Ok(());
        }

        info!(uuid, scope = scope.name(), ?hosts, "acquiring remote lock");
        if !extra.is_empty() {
            self.session.extra = extra;
        }
        self.session.scope = Some(*scope);
        self.set_state(SessionState::Acquiring).await;

        let total = hosts.len();
        let mut acquired: Vec<String> = Vec::with_capacity(total);
        for (index, host) in hosts.iter().enumerate() {
            if let Err(e) = self.acquire_host(host, scope, &uuid).await {
                error!(uuid, host, error = %e, "remote lock acquisition failed");
                self.rollback(scope, &uuid, host, &acquired).await;
                return Err(HostLockError::Acquire {
                    scope: scope.name().to_string(),
                    uuid,
                    hosts,
                    source: Box::new(e),
                });
            }
            acquired.push(host.clone());
            debug!(host, uuid, "partial remote lock acquired, {} out of {}", index + 1, total);
        }

        self.session.depth += 1;
        self.set_state(SessionState::Acquired).await;
        info!(uuid, "full remote lock acquired");
        Ok(())
    }

    async fn acquire_host(&mut self, host: &str, scope: &LockScope, uuid: &str) -> Result<()> {
        let node = self.executor.connect(host).await?;
        let client = HostLockClient::new(node.as_ref(), self.script_path(uuid));
        client.ensure_installed(&self.local_script).await?;

        self.ledger_insert(uuid, LedgerPhase::Acquiring, host).await;

        let metadata = self.metadata_for(host);
        let mut backoff = Backoff::new(
            self.config.initial_retry_delay(),
            self.config.max_retry_delay(),
        );
        let mut evaluated = false;

        loop {
            let outcome = client
                .acquire(&metadata, self.config.lease_ttl(), scope.name(), uuid)
                .await?;

            match outcome.code {
                LockRetCode::NoError => break,
                LockRetCode::ExpiredAndAcquired => {
                    warn!(
                        host,
                        scope = scope.name(),
                        expired_lock = %outcome.stderr,
                        "expired lock was removed and the lease reclaimed"
                    );
                    break;
                }
                code if code.is_blocked() => {
                    if self
                        .reclaim_if_stale(node.as_ref(), &client, code, scope, evaluated)
                        .await
                    {
                        info!(host, scope = scope.name(), "stale lock released, retrying acquire now");
                        continue;
                    }
                    evaluated = true;

                    let delay = backoff.next_delay();
                    info!(
                        host,
                        scope = scope.name(),
                        retry_in_secs = delay.as_secs(),
                        "lock held by another operation, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => {
                    return Err(HostLockError::protocol(
                        host,
                        format!(
                            "acquire of {} for {} failed unexpectedly: {}",
                            scope.name(),
                            uuid,
                            outcome.describe()
                        ),
                    ));
                }
            }
        }

        let handle = spawn_heartbeat(
            self.executor.clone(),
            self.cluster.clone(),
            HeartbeatTarget {
                host: host.to_string(),
                scope: scope.name().to_string(),
                uuid: uuid.to_string(),
                script: client.script().to_string(),
            },
            HeartbeatSettings::from(&self.config),
        );
        self.session.workers.insert(host.to_string(), handle);

        self.ledger_delete(uuid, LedgerPhase::Acquiring, host).await;
        if let Err(e) = self.ledger.delete_by_host(LedgerPhase::Acquired, host).await {
            warn!(host, error = %e, "failed to clear previous ledger rows");
        }
        self.ledger_insert(uuid, LedgerPhase::Acquired, host).await;
        Ok(())
    }

    /// Inspect the lock blocking `client` and wipe the host when its owner is
    /// gone. Returns whether the acquire should be retried immediately.
    async fn reclaim_if_stale(
        &self,
        node: &dyn RemoteNode,
        client: &HostLockClient<'_>,
        code: LockRetCode,
        scope: &LockScope,
        evaluated: bool,
    ) -> bool {
        let host = client.host();
        let target = match code {
            LockRetCode::NotAcquired => InfoTarget::Scope(scope.name().to_string()),
            _ => InfoTarget::Legacy,
        };

        let blocking = match client.get_info(target).await {
            Ok(blocking) => blocking,
            Err(e) => {
                warn!(host, error = %e, "could not read blocking lock information");
                return false;
            }
        };

        if !evaluated {
            info!(
                host,
                scope = scope.name(),
                lock = %blocking.to_pretty_json(),
                "lock already acquired by another operation, waiting until it gets released"
            );
        }

        let detector = StalenessDetector::new(
            self.cluster.as_ref(),
            self.worker_status.as_ref(),
            &self.local_hostname,
        );
        match detector.evaluate(&blocking).await {
            Staleness::Live => false,
            Staleness::Stale(reason) => {
                info!(
                    host,
                    owner = blocking.owner_hostname.as_deref().unwrap_or("unknown"),
                    reason, "releasing stale lock"
                );
                match self.wipe_node(node).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(host, error = %e, "failed to remove stale lock");
                        false
                    }
                }
            }
        }
    }

    /// Undo a failed acquire: stop heartbeats and release the hosts acquired
    /// so far, newest first.
    async fn rollback(&mut self, scope: &LockScope, uuid: &str, failed_host: &str, acquired: &[String]) {
        self.ledger_delete(uuid, LedgerPhase::Acquiring, failed_host).await;
        self.stop_workers(StopPolicy::from(&self.config)).await;

        for host in acquired.iter().rev() {
            match self.release_host(host, scope.name(), uuid).await {
                Ok(_) => info!(host, uuid, "rolled back partial remote lock"),
                Err(e) => warn!(host, uuid, error = %e, "failed to roll back partial remote lock"),
            }
            self.ledger_delete(uuid, LedgerPhase::Acquired, host).await;
        }

        self.session.depth = 0;
        self.session.scope = None;
        self.set_state(SessionState::Released).await;
    }
}
