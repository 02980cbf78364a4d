//! In-process ledger.

use super::{LedgerPhase, LedgerRow, LockLedger};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Ledger kept in memory. Used when no ledger file is configured.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<LedgerRow>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows_mut(&self) -> MutexGuard<'_, Vec<LedgerRow>> {
        self.rows.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl LockLedger for MemoryLedger {
    async fn insert(&self, row: LedgerRow) -> Result<()> {
        self.rows_mut().push(row);
        Ok(())
    }

    async fn delete(&self, uuid: &str, phase: LedgerPhase, hostname: &str) -> Result<()> {
        self.rows_mut().retain(|row| !row.matches(uuid, phase, hostname));
        Ok(())
    }

    async fn delete_by_host(&self, phase: LedgerPhase, hostname: &str) -> Result<()> {
        self.rows_mut()
            .retain(|row| !(row.phase == phase && row.hostname == hostname));
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<LedgerRow>> {
        Ok(self.rows_mut().clone())
    }
}
