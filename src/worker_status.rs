//! Local worker status queries.
//!
//! Lock metadata records the port of the supervising worker that took the
//! lock. When a blocking lock was taken from this very machine, asking that
//! worker what it is running tells us whether the lock owner is still alive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Status answered by a supervising worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Uuid of the job the worker is currently running.
    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl WorkerStatus {
    pub fn running(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            other: BTreeMap::new(),
        }
    }
}

/// Liveness probe for local supervising workers.
#[async_trait]
pub trait WorkerStatusProbe: Send + Sync {
    /// Status of the worker listening on `port`, or `None` when it does not
    /// answer.
    async fn status(&self, port: u16) -> Option<WorkerStatus>;
}

/// Queries `GET http://127.0.0.1:{port}/status`.
#[derive(Debug, Clone)]
pub struct HttpWorkerStatus {
    client: reqwest::Client,
    host: String,
    timeout: Duration,
}

impl HttpWorkerStatus {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: "127.0.0.1".to_string(),
            timeout,
        }
    }

    fn status_url(&self, port: u16) -> String {
        format!("http://{}:{}/status", self.host, port)
    }
}

#[async_trait]
impl WorkerStatusProbe for HttpWorkerStatus {
    async fn status(&self, port: u16) -> Option<WorkerStatus> {
        let url = self.status_url(port);
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "worker did not answer");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "worker status request failed");
            return None;
        }

        match response.json::<WorkerStatus>().await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(%url, error = %e, "worker status is not valid JSON");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_url_targets_loopback() {
        let probe = HttpWorkerStatus::new(Duration::from_secs(1));
        assert_eq!(probe.status_url(7080), "http://127.0.0.1:7080/status");
    }

    #[test]
    fn status_keeps_unknown_fields() {
        let status: WorkerStatus =
            serde_json::from_str(r#"{"uuid": "abc_1", "state": "running"}"#).unwrap();
        assert_eq!(status.uuid.as_deref(), Some("abc_1"));
        assert_eq!(status.other["state"], "running");
    }

    #[tokio::test]
    async fn unreachable_worker_reports_none() {
        // Port 9 (discard) is closed on loopback in test environments.
        let probe = HttpWorkerStatus::new(Duration::from_millis(500));
        assert!(probe.status(9).await.is_none());
    }
}
