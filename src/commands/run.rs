//! Implementation of the `hostlock run` command.

use super::{build_lock, parse_extra, resolve_scope, target_hosts};
use crate::cli::{GlobalArgs, RunArgs};
use crate::error::{HostLockError, Result};
use tokio::process::Command;
use tracing::{info, warn};

/// Execute the `hostlock run` command.
///
/// Holds the lock for the lifetime of the child process. A failing child
/// is reported with its own exit code after the lock is released.
pub async fn cmd_run(global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let scope = resolve_scope(&args.scope)?;
    let extra = parse_extra(&args.info)?;
    let command_line = shell_words::join(&args.command);

    let mut lock = target_hosts(build_lock(global, Some(command_line.clone()))?, &args.scope);
    info!(uuid = %lock.uuid(), %scope, command = %command_line, "running under remote lock");

    lock.run_locked(&scope, extra, || run_child(&args.command, &command_line))
        .await
}

async fn run_child(argv: &[String], command_line: &str) -> Result<()> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| HostLockError::UserError("no command given".to_string()))?;

    let mut child = Command::new(program)
        .args(rest)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            HostLockError::UserError(format!("failed to start '{}': {}", command_line, e))
        })?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| {
            HostLockError::UserError(format!("failed to wait for '{}': {}", command_line, e))
        })?,
        _ = tokio::signal::ctrl_c() => {
            warn!(command = %command_line, "interrupted, stopping command and releasing locks");
            return Err(HostLockError::UserError("interrupted".to_string()));
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(HostLockError::CommandFailed {
            command: command_line.to_string(),
            code: status.code().unwrap_or(1),
        })
    }
}
