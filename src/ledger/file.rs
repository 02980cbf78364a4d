//! JSON file ledger.

use super::{LedgerPhase, LedgerRow, LockLedger};
use crate::error::{HostLockError, Result};
use crate::fs::atomic_write_file;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Ledger persisted as a JSON array.
///
/// Every mutation reads the file, applies the change and atomically replaces
/// it. Mutations from one process are serialized; concurrent writers from
/// different processes may lose rows, which the ledger tolerates.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<LedgerRow>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HostLockError::UserError(format!(
                    "failed to read ledger '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            HostLockError::UserError(format!(
                "failed to parse ledger '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn store(&self, rows: &[LedgerRow]) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| HostLockError::UserError(format!("failed to serialize ledger: {}", e)))?;
        atomic_write_file(&self.path, &json)
    }

    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<LedgerRow>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load()?;
        change(&mut rows);
        self.store(&rows)
    }
}

#[async_trait]
impl LockLedger for FileLedger {
    async fn insert(&self, row: LedgerRow) -> Result<()> {
        self.update(move |rows| rows.push(row)).await
    }

    async fn delete(&self, uuid: &str, phase: LedgerPhase, hostname: &str) -> Result<()> {
        self.update(|rows| rows.retain(|row| !row.matches(uuid, phase, hostname)))
            .await
    }

    async fn delete_by_host(&self, phase: LedgerPhase, hostname: &str) -> Result<()> {
        self.update(|rows| rows.retain(|row| !(row.phase == phase && row.hostname == hostname)))
            .await
    }

    async fn rows(&self) -> Result<Vec<LedgerRow>> {
        let _guard = self.write_lock.lock().await;
        self.load()
    }
}
