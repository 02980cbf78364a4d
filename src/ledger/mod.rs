//! Lock ledger.
//!
//! A best-effort index of which `(uuid, host)` pairs are being acquired or
//! are held, kept for fleet visibility and for operator cleanup tooling. The
//! hosts remain the only authority on who holds a lease: the ledger is never
//! consulted by acquire or release, and rows may go stale when a process is
//! killed mid-operation.

mod file;
mod memory;


use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use file::FileLedger;
pub use memory::MemoryLedger;

/// Phase a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerPhase {
    Acquiring,
    Acquired,
}

impl fmt::Display for LedgerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerPhase::Acquiring => write!(f, "acquiring"),
            LedgerPhase::Acquired => write!(f, "acquired"),
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub uuid: String,
    pub phase: LedgerPhase,
    pub hostname: String,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerRow {
    pub fn new(uuid: impl Into<String>, phase: LedgerPhase, hostname: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            phase,
            hostname: hostname.into(),
            recorded_at: Utc::now(),
        }
    }

    fn matches(&self, uuid: &str, phase: LedgerPhase, hostname: &str) -> bool {
        self.uuid == uuid && self.phase == phase && self.hostname == hostname
    }
}

/// Persisted store of ledger rows.
#[async_trait]
pub trait LockLedger: Send + Sync {
    async fn insert(&self, row: LedgerRow) -> Result<()>;

    /// Delete the rows for `(uuid, phase, hostname)`.
    async fn delete(&self, uuid: &str, phase: LedgerPhase, hostname: &str) -> Result<()>;

    /// Delete every row of `phase` for `hostname`, whoever owns it.
    async fn delete_by_host(&self, phase: LedgerPhase, hostname: &str) -> Result<()>;

    /// All rows, oldest first.
    async fn rows(&self) -> Result<Vec<LedgerRow>>;
}
