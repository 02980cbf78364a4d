//! Handle used to stop a heartbeat worker.

use super::worker::HeartbeatExit;
use crate::config::LockConfig;
use crate::error::{HostLockError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How hard to try when stopping a worker.
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    /// Wait after cancelling before escalating.
    pub join_timeout: Duration,
    /// Forced aborts attempted before giving up.
    pub kill_retries: u32,
    /// Wait after each forced abort.
    pub kill_retry_delay: Duration,
}

impl From<&LockConfig> for StopPolicy {
    fn from(config: &LockConfig) -> Self {
        Self {
            join_timeout: config.worker_join_timeout(),
            kill_retries: config.kill_retries,
            kill_retry_delay: config.kill_retry_delay(),
        }
    }
}

/// Owning handle of a running heartbeat worker.
///
/// Dropping the handle cancels the worker, so a session that goes away
/// without releasing stops renewing its leases and lets them expire.
#[derive(Debug)]
pub struct HeartbeatHandle {
    host: String,
    token: CancellationToken,
    join: Option<JoinHandle<HeartbeatExit>>,
}

impl HeartbeatHandle {
    pub(super) fn new(host: String, token: CancellationToken, join: JoinHandle<HeartbeatExit>) -> Self {
        Self {
            host,
            token,
            join: Some(join),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the worker has already stopped on its own.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the worker and wait for it, aborting it if it does not stop.
    pub async fn stop(mut self, policy: StopPolicy) -> Result<HeartbeatExit> {
        self.token.cancel();
        let Some(mut join) = self.join.take() else {
            return Ok(HeartbeatExit::Cancelled);
        };

        if let Ok(joined) = tokio::time::timeout(policy.join_timeout, &mut join).await {
            return self.joined(joined);
        }

        for attempt in 1..=policy.kill_retries {
            info!(
                host = %self.host,
                attempt, "heartbeat worker still alive after cancellation, aborting"
            );
            join.abort();
            if let Ok(joined) = tokio::time::timeout(policy.kill_retry_delay, &mut join).await {
                return self.joined(joined);
            }
        }

        Err(HostLockError::UserError(format!(
            "heartbeat worker for {} did not stop after {} aborts",
            self.host, policy.kill_retries
        )))
    }

    fn joined(
        &self,
        joined: std::result::Result<HeartbeatExit, tokio::task::JoinError>,
    ) -> Result<HeartbeatExit> {
        match joined {
            Ok(exit) => Ok(exit),
            Err(e) if e.is_cancelled() => Ok(HeartbeatExit::Aborted),
            Err(e) => Err(HostLockError::UserError(format!(
                "heartbeat worker for {} panicked: {}",
                self.host, e
            ))),
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
