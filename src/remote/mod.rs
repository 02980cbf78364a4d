//! Remote execution layer.
//!
//! The lock protocol only ever needs five things from a host: run a command
//! and read its exit status and output, copy a file over, test for a file and
//! checksum a file. `RemoteExecutor` hands out per-host `RemoteNode`
//! connections; the ssh implementation lives in [`ssh`].

mod ssh;


use crate::error::{HostLockError, Result};
use async_trait::async_trait;
use std::path::Path;

pub use ssh::SshExecutor;

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status reported by the remote shell.
    pub exit_code: i32,
    /// Standard output (trimmed).
    pub stdout: String,
    /// Standard error (trimmed).
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into().trim().to_string(),
            stderr: stderr.into().trim().to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opens connections to hosts.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Connect to `host`. Fails with a transport error when it is unreachable.
    async fn connect(&self, host: &str) -> Result<Box<dyn RemoteNode>>;
}

/// A connection to a single host.
#[async_trait]
pub trait RemoteNode: Send + Sync {
    /// Name of the connected host.
    fn host(&self) -> &str;

    /// Run a shell command and capture its exit status and output.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Copy a local file to `remote_path`, replacing any existing file.
    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Whether `remote_path` exists on the host.
    async fn file_exists(&self, remote_path: &str) -> Result<bool>;

    /// Hex sha256 digest of `remote_path`, or `None` when it cannot be read.
    async fn sha256(&self, remote_path: &str) -> Result<Option<String>>;

    /// Run a command that must succeed.
    async fn exec_check(&self, command: &str) -> Result<CommandOutput> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(HostLockError::protocol(
                self.host(),
                format!(
                    "'{}' failed (exit code {}): {}",
                    command,
                    output.exit_code,
                    if output.stderr.is_empty() {
                        &output.stdout
                    } else {
                        &output.stderr
                    }
                ),
            ))
        }
    }
}
