//! Per-orchestrator lock session state.

use super::scope::LockScope;
use crate::cluster::SessionState;
use crate::heartbeat::HeartbeatHandle;
use crate::protocol::ExtraInfo;
use std::collections::BTreeMap;

/// State of the locks held by one orchestrator.
#[derive(Debug, Default)]
pub(crate) struct LockSession {
    /// Nesting depth of `acquire` calls.
    pub depth: u32,
    /// Scope of the outermost acquire.
    pub scope: Option<LockScope>,
    pub extra: ExtraInfo,
    /// Heartbeat worker per held host.
    pub workers: BTreeMap<String, HeartbeatHandle>,
    pub state: SessionState,
}

impl LockSession {
    /// Take every tracked worker handle, leaving none behind.
    pub fn take_workers(&mut self) -> Vec<HeartbeatHandle> {
        std::mem::take(&mut self.workers).into_values().collect()
    }

    pub fn held_hosts(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }
}
