//! Implementations of the `hostlock info` and `hostlock ledger` commands.

use super::{build_lock, load_config, open_ledger};
use crate::cli::{GlobalArgs, InfoArgs};
use crate::error::Result;
use crate::orchestrator::LockScope;

/// Execute the `hostlock info` command.
///
/// Prints the metadata of the lock held for the scope on the host.
pub async fn cmd_info(global: &GlobalArgs, args: InfoArgs) -> Result<()> {
    let scope: LockScope = args.scope.parse()?;
    let lock = build_lock(global, None)?;
    let info = lock.lock_info(&args.host, &scope).await?;
    println!("{}", info.to_pretty_json());
    Ok(())
}

/// Execute the `hostlock ledger` command.
pub async fn cmd_ledger(global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    if config.ledger_path.is_none() {
        println!("No ledger_path configured; nothing is recorded between runs.");
        return Ok(());
    }

    let rows = open_ledger(&config).rows().await?;
    if rows.is_empty() {
        println!("No ledger rows.");
        return Ok(());
    }

    println!("{:<40} {:<10} {:<24} RECORDED", "UUID", "PHASE", "HOST");
    for row in rows {
        println!(
            "{:<40} {:<10} {:<24} {}",
            row.uuid,
            row.phase.to_string(),
            row.hostname,
            row.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
