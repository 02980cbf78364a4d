//! Staleness detection for blocking locks.
//!
//! A lock that has not expired may still be abandoned: its owner crashed and
//! no heartbeat will ever refresh it, but the lease has some minutes left. The
//! detector decides whether such a lock can be reclaimed right away:
//!
//! - owned from this machine: ask the supervising worker recorded in the lock
//!   whether it is alive and still running the lock's job
//! - owned from another machine: ping that machine
//! - no owner hostname recorded: never guess

use crate::cluster::ClusterControl;
use crate::identity::same_host;
use crate::protocol::{LockMetadata, NIL_UUID, run_uuid};
use crate::worker_status::WorkerStatusProbe;
use tracing::{debug, error, warn};

/// Outcome of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The owner is alive, or we cannot tell.
    Live,
    /// The owner is gone; the lock may be removed.
    Stale(String),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }
}

/// Decides whether a blocking lock is abandoned.
pub struct StalenessDetector<'a> {
    cluster: &'a dyn ClusterControl,
    worker_status: &'a dyn WorkerStatusProbe,
    local_hostname: &'a str,
}

impl<'a> StalenessDetector<'a> {
    pub fn new(
        cluster: &'a dyn ClusterControl,
        worker_status: &'a dyn WorkerStatusProbe,
        local_hostname: &'a str,
    ) -> Self {
        Self {
            cluster,
            worker_status,
            local_hostname,
        }
    }

    pub async fn evaluate(&self, lock: &LockMetadata) -> Staleness {
        match lock.owner_hostname.as_deref() {
            Some(owner) if same_host(owner, self.local_hostname) => self.evaluate_local(lock).await,
            Some(owner) => {
                if self.cluster.ping_host(owner).await {
                    Staleness::Live
                } else {
                    error!(owner, "ping check for the host holding the lock failed");
                    Staleness::Stale(format!("owner host {} is unreachable", owner))
                }
            }
            None => {
                warn!(
                    lock = %lock.to_pretty_json(),
                    "hostname information missing from lock metadata"
                );
                Staleness::Live
            }
        }
    }

    async fn evaluate_local(&self, lock: &LockMetadata) -> Staleness {
        let port = match lock.worker_port {
            Some(port) if port != 0 => port,
            _ => {
                debug!("lock taken from this machine carries no worker port");
                return Staleness::Live;
            }
        };

        let Some(status) = self.worker_status.status(port).await else {
            error!(port, "worker is not accessible");
            return Staleness::Stale(format!("worker on port {} is not accessible", port));
        };

        let running = run_uuid(status.uuid.as_deref().unwrap_or(NIL_UUID));
        let owner = lock.owner_run_uuid();
        if running != owner {
            error!(
                port,
                running, owner, "worker is running a job that does not match the lock"
            );
            return Staleness::Stale(format!(
                "worker on port {} runs {} instead of {}",
                port, running, owner
            ));
        }

        debug!(port, "worker holding the lock is running and active");
        Staleness::Live
    }
}
