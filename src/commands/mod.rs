//! Command implementations for hostlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and builds the orchestrator from the global options.

mod cleanup;
mod run;
mod show;


use crate::cli::{Cli, Command, GlobalArgs, ScopeArgs};
use crate::cluster::{Inventory, InventoryCluster};
use crate::config::LockConfig;
use crate::error::{HostLockError, Result};
use crate::ledger::{FileLedger, LockLedger, MemoryLedger};
use crate::orchestrator::{LockScope, RemoteLock};
use crate::protocol::ExtraInfo;
use crate::remote::SshExecutor;
use serde_json::Value;
use std::sync::Arc;

/// Dispatch a command to its implementation.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Command::Run(args) => run::cmd_run(&global, args).await,
        Command::RemoveAll(args) => cleanup::cmd_remove_all(&global, args).await,
        Command::ReleaseUnowned(args) => cleanup::cmd_release_unowned(&global, args).await,
        Command::Info(args) => show::cmd_info(&global, args).await,
        Command::Ledger => show::cmd_ledger(&global).await,
    }
}

/// Load the lock configuration, falling back to defaults.
fn load_config(global: &GlobalArgs) -> Result<LockConfig> {
    match &global.config {
        Some(path) => LockConfig::load(path),
        None => Ok(LockConfig::default()),
    }
}

fn open_ledger(config: &LockConfig) -> Arc<dyn LockLedger> {
    match &config.ledger_path {
        Some(path) => Arc::new(FileLedger::new(path)),
        None => Arc::new(MemoryLedger::new()),
    }
}

/// Build an orchestrator talking to the inventory's hosts over ssh.
fn build_lock(global: &GlobalArgs, command: Option<String>) -> Result<RemoteLock> {
    let config = load_config(global)?;
    let inventory = Inventory::load(&global.inventory)?;

    let mut cluster = InventoryCluster::new(inventory);
    if let Some(command) = command {
        cluster = cluster.with_command(command);
    }

    let ledger = open_ledger(&config);
    let executor = SshExecutor::new(config.ssh.clone());
    Ok(RemoteLock::new(Arc::new(cluster), Arc::new(executor), config)
        .with_ledger(ledger)
        .with_worker_port(global.worker_port))
}

fn resolve_scope(args: &ScopeArgs) -> Result<LockScope> {
    args.scope.parse()
}

/// Explicit hosts replace the scope's role lookup but keep its lock name.
fn target_hosts(lock: RemoteLock, args: &ScopeArgs) -> RemoteLock {
    let hosts: Vec<String> = args
        .hosts
        .iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if hosts.is_empty() {
        lock
    } else {
        lock.with_hosts(hosts)
    }
}

/// Parse `key=value` pairs into lock extra information.
fn parse_extra(pairs: &[String]) -> Result<ExtraInfo> {
    let mut extra = ExtraInfo::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            HostLockError::UserError(format!(
                "invalid --info '{}': expected KEY=VALUE",
                pair
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(HostLockError::UserError(format!(
                "invalid --info '{}': key is empty",
                pair
            )));
        }
        extra.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(extra)
}
