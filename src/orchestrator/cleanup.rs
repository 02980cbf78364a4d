//! Ownership-agnostic cleanup and inspection.

use super::{LockScope, RemovalReport, RemoteLock};
use crate::cluster::HostRole;
use crate::error::Result;
use crate::protocol::{HostLockClient, InfoTarget, LockMetadata, remote_script_path};
use crate::remote::RemoteNode;
use tracing::{error, info, warn};
use uuid::Uuid;

impl RemoteLock {
    /// Remove every lock on `host`, or on every compute host, whoever owns
    /// them. This session's own locks are cleared first.
    ///
    /// Never fails; the report lists hosts that could not be cleaned.
    pub async fn remove_all_locks(&mut self, host: Option<&str>) -> RemovalReport {
        if let Some(scope) = self.session.scope
            && let Err(e) = self.clear(&scope).await
        {
            warn!(error = %e, "failed to clear locks held by this session");
        }

        let hosts = match host {
            Some(host) => vec![host.to_string()],
            None => match self.cluster.hosts_for_role(HostRole::Compute).await {
                Ok(hosts) => hosts,
                Err(e) => {
                    error!(error = %e, "could not list compute hosts");
                    return RemovalReport::default();
                }
            },
        };
        info!(?hosts, "forcefully removing locks");

        let mut report = RemovalReport::default();
        for host in hosts {
            match self.wipe_host(&host).await {
                Ok(()) => {
                    info!(host, "remote locks removed");
                    report.removed.push(host);
                }
                Err(e) => {
                    error!(host, error = %e, "failed to remove remote locks");
                    report.failed.push((host, e.to_string()));
                }
            }
        }
        report
    }

    async fn wipe_host(&self, host: &str) -> Result<()> {
        let node = self.executor.connect(host).await?;
        self.wipe_node(node.as_ref()).await
    }

    /// Run `remove --all` through a throwaway helper copy, so no owner's
    /// heartbeat loses its script.
    pub(super) async fn wipe_node(&self, node: &dyn RemoteNode) -> Result<()> {
        let client = HostLockClient::new(node, self.throwaway_script());
        client.ensure_installed(&self.local_script).await?;

        let removed = client.remove_all().await;
        let uninstalled = client.uninstall().await;
        removed?;
        uninstalled
    }

    fn throwaway_script(&self) -> String {
        remote_script_path(&self.config.remote_script_dir, &Uuid::new_v4().to_string())
    }

    /// Metadata of the lock currently held for `scope` on `host`.
    pub async fn lock_info(&self, host: &str, scope: &LockScope) -> Result<LockMetadata> {
        let node = self.executor.connect(host).await?;
        let client = HostLockClient::new(node.as_ref(), self.throwaway_script());
        client.ensure_installed(&self.local_script).await?;

        let info = client
            .get_info(InfoTarget::Scope(scope.name().to_string()))
            .await;
        if let Err(e) = client.uninstall().await {
            warn!(host, error = %e, "failed to delete helper copy");
        }
        info
    }
}
