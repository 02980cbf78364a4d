//! The heartbeat loop.

use super::handle::HeartbeatHandle;
use crate::cluster::ClusterControl;
use crate::config::LockConfig;
use crate::protocol::{HostLockClient, LockRetCode};
use crate::remote::RemoteExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing of a heartbeat worker.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    /// Polling tick.
    pub tick: Duration,
    pub ping_interval: Duration,
    pub refresh_interval: Duration,
    /// Validity requested on each refresh.
    pub lease_ttl: Duration,
}

impl From<&LockConfig> for HeartbeatSettings {
    fn from(config: &LockConfig) -> Self {
        Self {
            tick: config.heartbeat_tick(),
            ping_interval: config.ping_interval(),
            refresh_interval: config.refresh_interval(),
            lease_ttl: config.lease_ttl(),
        }
    }
}

/// The lease a worker keeps alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatTarget {
    pub host: String,
    pub scope: String,
    pub uuid: String,
    /// Remote helper path installed for `uuid`.
    pub script: String,
}

/// Why a heartbeat worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Stopped by its handle.
    Cancelled,
    /// Aborted after ignoring cancellation.
    Aborted,
    /// The host stopped answering pings; the lease will expire on its own.
    HostUnreachable,
    /// The helper script was removed, i.e. the lock was released externally.
    ScriptRemoved,
    /// The host refused a refresh.
    RefreshFailed(LockRetCode),
    /// The host could not be talked to.
    TransportError(String),
}

/// Start a heartbeat worker for `target`.
pub fn spawn_heartbeat(
    executor: Arc<dyn RemoteExecutor>,
    cluster: Arc<dyn ClusterControl>,
    target: HeartbeatTarget,
    settings: HeartbeatSettings,
) -> HeartbeatHandle {
    let token = CancellationToken::new();
    let host = target.host.clone();
    let task_token = token.clone();

    let join = tokio::spawn(async move {
        let exit = run(executor, cluster, &target, settings, task_token).await;
        debug!(host = %target.host, ?exit, "heartbeat worker finished");
        exit
    });

    HeartbeatHandle::new(host, token, join)
}

async fn run(
    executor: Arc<dyn RemoteExecutor>,
    cluster: Arc<dyn ClusterControl>,
    target: &HeartbeatTarget,
    settings: HeartbeatSettings,
    token: CancellationToken,
) -> HeartbeatExit {
    let host = target.host.as_str();
    let node = tokio::select! {
        _ = token.cancelled() => return HeartbeatExit::Cancelled,
        node = executor.connect(host) => match node {
            Ok(node) => node,
            Err(e) => {
                warn!(host, error = %e, "heartbeat could not connect");
                return HeartbeatExit::TransportError(e.to_string());
            }
        },
    };
    let client = HostLockClient::new(node.as_ref(), target.script.clone());

    let mut last_refresh = Instant::now();
    let mut last_ping = Instant::now();

    loop {
        tokio::select! {
            _ = token.cancelled() => return HeartbeatExit::Cancelled,
            _ = tokio::time::sleep(settings.tick) => {}
        }

        if last_ping.elapsed() > settings.ping_interval {
            if !cluster.ping_host(host).await {
                info!(host, "host is not answering, stopping heartbeat");
                info!(host, "once the host is available again, make sure to remove its locks");
                return HeartbeatExit::HostUnreachable;
            }
            debug!(host, "host is pingable, continuing heartbeat");
            last_ping = Instant::now();
        }

        match client.is_installed().await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    host,
                    script = %target.script,
                    "helper script removed, lock was released externally"
                );
                return HeartbeatExit::ScriptRemoved;
            }
            Err(e) => return HeartbeatExit::TransportError(e.to_string()),
        }

        if last_refresh.elapsed() > settings.refresh_interval {
            info!(host, scope = %target.scope, uuid = %target.uuid, "heartbeat refreshing lock");
            match client
                .refresh(settings.lease_ttl, &target.scope, &target.uuid)
                .await
            {
                Ok(outcome) if outcome.code == LockRetCode::NoError => {
                    last_refresh = Instant::now();
                }
                Ok(outcome) => {
                    warn!(host, code = %outcome.code, "lock refresh refused, stopping heartbeat");
                    return HeartbeatExit::RefreshFailed(outcome.code);
                }
                Err(e) => {
                    warn!(host, error = %e, "lock refresh failed, stopping heartbeat");
                    return HeartbeatExit::TransportError(e.to_string());
                }
            }
        }
    }
}
