//! Implementations of the `hostlock remove-all` and `hostlock
//! release-unowned` commands.

use super::{build_lock, resolve_scope, target_hosts};
use crate::cli::{GlobalArgs, ReleaseUnownedArgs, RemoveAllArgs};
use crate::error::{HostLockError, Result};
use crate::orchestrator::RemovalReport;

/// Execute the `hostlock remove-all` command.
pub async fn cmd_remove_all(global: &GlobalArgs, args: RemoveAllArgs) -> Result<()> {
    let mut lock = build_lock(global, None)?;
    let report = lock.remove_all_locks(args.host.as_deref()).await;
    print_report("Removed locks on", &report);
    into_result(report)
}

/// Execute the `hostlock release-unowned` command.
pub async fn cmd_release_unowned(global: &GlobalArgs, args: ReleaseUnownedArgs) -> Result<()> {
    let scope = resolve_scope(&args.scope)?;
    let mut lock = target_hosts(build_lock(global, None)?, &args.scope);
    let report = lock.release_unowned(&args.uuid, &scope).await;
    print_report(&format!("Released {} on", args.uuid), &report);
    into_result(report)
}

fn print_report(action: &str, report: &RemovalReport) {
    for host in &report.removed {
        println!("{} {}", action, host);
    }
    for (host, reason) in &report.failed {
        eprintln!("Failed on {}: {}", host, reason);
    }
}

fn into_result(report: RemovalReport) -> Result<()> {
    if report.is_complete() {
        Ok(())
    } else {
        Err(HostLockError::UserError(format!(
            "{} host(s) need manual cleanup",
            report.failed.len()
        )))
    }
}
