//! CLI argument parsing for hostlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// hostlock: lease-based advisory locks across a fleet of hosts.
///
/// Locks are taken per scope on every host of a cluster role, in sorted
/// host order, and kept alive by heartbeats until released.
#[derive(Parser, Debug)]
#[command(name = "hostlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Lock configuration file (YAML). Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cluster inventory file (YAML).
    #[arg(long, global = true, default_value = "inventory.yaml")]
    pub inventory: PathBuf,

    /// Port of the supervising worker, recorded in lock metadata.
    #[arg(long, global = true, env = "HOSTLOCK_WORKER_PORT")]
    pub worker_port: Option<u16>,
}

/// Available commands for hostlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a local command while holding a lock.
    ///
    /// Acquires the scope on every host, runs the command, then releases.
    /// The command's exit code is passed through.
    Run(RunArgs),

    /// Forcefully remove every lock on one or all compute hosts.
    ///
    /// Removes locks regardless of owner. Meant for operator cleanup.
    RemoveAll(RemoveAllArgs),

    /// Release a lock left behind by another run.
    ReleaseUnowned(ReleaseUnownedArgs),

    /// Print the lock currently held for a scope on a host.
    Info(InfoArgs),

    /// List ledger rows.
    Ledger,
}

/// Scope selection shared by commands that take locks.
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Lock scope: default (compute), vm, cell or switch.
    #[arg(short, long, default_value = "default")]
    pub scope: String,

    /// Lock these hosts instead of the scope's role members, still under the
    /// scope's name (comma-separated or repeated).
    #[arg(long = "host", value_delimiter = ',')]
    pub hosts: Vec<String>,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Extra lock information as key=value (repeatable).
    #[arg(long = "info", value_name = "KEY=VALUE")]
    pub info: Vec<String>,

    /// Command to run under the lock.
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

/// Arguments for the `remove-all` command.
#[derive(Args, Debug)]
pub struct RemoveAllArgs {
    /// Only remove locks on this host.
    #[arg(long)]
    pub host: Option<String>,
}

/// Arguments for the `release-unowned` command.
#[derive(Args, Debug)]
pub struct ReleaseUnownedArgs {
    /// Uuid of the lock owner (`{cluster uuid}_{pid}`).
    pub uuid: String,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

/// Arguments for the `info` command.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Host to inspect.
    #[arg(long)]
    pub host: String,

    /// Lock scope to inspect.
    #[arg(short, long, default_value = "default")]
    pub scope: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from([
            "hostlock",
            "run",
            "--scope",
            "cell",
            "--info",
            "step=patching",
            "--",
            "patch.sh",
            "--all",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.scope.scope, "cell");
        assert!(args.scope.hosts.is_empty());
        assert_eq!(args.info, vec!["step=patching"]);
        assert_eq!(args.command, vec!["patch.sh", "--all"]);
    }

    #[test]
    fn parse_run_requires_command() {
        assert!(Cli::try_parse_from(["hostlock", "run"]).is_err());
    }

    #[test]
    fn parse_explicit_hosts() {
        let cli = Cli::try_parse_from([
            "hostlock",
            "run",
            "--host",
            "dom0-b,dom0-a",
            "--host",
            "dom0-c",
            "--",
            "true",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.scope.hosts, vec!["dom0-b", "dom0-a", "dom0-c"]);
    }

    #[test]
    fn parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hostlock",
            "remove-all",
            "--host",
            "dom0-a",
            "--inventory",
            "/etc/cluster.yaml",
            "--worker-port",
            "7080",
        ])
        .unwrap();
        assert_eq!(cli.global.inventory, PathBuf::from("/etc/cluster.yaml"));
        assert_eq!(cli.global.worker_port, Some(7080));
        let Command::RemoveAll(args) = cli.command else {
            panic!("Expected RemoveAll command");
        };
        assert_eq!(args.host.as_deref(), Some("dom0-a"));
    }

    #[test]
    fn parse_release_unowned() {
        let cli =
            Cli::try_parse_from(["hostlock", "release-unowned", "run-a_42", "-s", "vm"]).unwrap();
        let Command::ReleaseUnowned(args) = cli.command else {
            panic!("Expected ReleaseUnowned command");
        };
        assert_eq!(args.uuid, "run-a_42");
        assert_eq!(args.scope.scope, "vm");
    }

    #[test]
    fn parse_ledger() {
        let cli = Cli::try_parse_from(["hostlock", "ledger"]).unwrap();
        assert!(matches!(cli.command, Command::Ledger));
        assert_eq!(cli.global.inventory, PathBuf::from("inventory.yaml"));
    }
}
