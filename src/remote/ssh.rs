//! ssh/scp backed remote executor.
//!
//! Every operation shells out to the system `ssh` or `scp` binary with
//! `BatchMode` style options from the config, so host keys and credentials are
//! whatever the operator's ssh setup provides.

use super::{CommandOutput, RemoteExecutor, RemoteNode};
use crate::config::SshSettings;
use crate::error::{HostLockError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Exit status ssh itself uses for connection-level failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Remote executor running commands over ssh.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    settings: SshSettings,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn destination(&self, host: &str) -> String {
        match &self.settings.user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn connect(&self, host: &str) -> Result<Box<dyn RemoteNode>> {
        let node = SshNode {
            host: host.to_string(),
            destination: self.destination(host),
            options: self.settings.options.clone(),
            timeout: self.settings.command_timeout(),
        };

        // Fail fast on unreachable hosts instead of on the first real command.
        node.exec("true").await?;
        debug!(host, "connected");

        Ok(Box::new(node))
    }
}

struct SshNode {
    host: String,
    destination: String,
    options: Vec<String>,
    timeout: Duration,
}

impl SshNode {
    fn option_args(&self) -> Vec<String> {
        self.options
            .iter()
            .flat_map(|opt| ["-o".to_string(), opt.clone()])
            .collect()
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput> {
        trace!(host = %self.host, program, ?args, "running");

        let child = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                HostLockError::transport(
                    &self.host,
                    format!("{} timed out after {}s", program, self.timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                HostLockError::transport(&self.host, format!("failed to execute {}: {}", program, e))
            })?;

        let result = CommandOutput::new(
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        if result.exit_code == SSH_CONNECTION_FAILURE {
            return Err(HostLockError::transport(&self.host, result.stderr));
        }

        Ok(result)
    }
}

#[async_trait]
impl RemoteNode for SshNode {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut args = self.option_args();
        args.push(self.destination.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        self.run("ssh", args).await
    }

    async fn copy_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let mut args = self.option_args();
        args.push("-q".to_string());
        args.push(local_path.display().to_string());
        args.push(format!("{}:{}", self.destination, remote_path));

        let output = self.run("scp", args).await?;
        if output.success() {
            Ok(())
        } else {
            Err(HostLockError::transport(
                &self.host,
                format!(
                    "failed to copy '{}' to '{}': {}",
                    local_path.display(),
                    remote_path,
                    output.stderr
                ),
            ))
        }
    }

    async fn file_exists(&self, remote_path: &str) -> Result<bool> {
        let output = self
            .exec(&format!("test -e {}", shell_words::quote(remote_path)))
            .await?;
        Ok(output.success())
    }

    async fn sha256(&self, remote_path: &str) -> Result<Option<String>> {
        let output = self
            .exec(&format!("/usr/bin/sha256sum {}", shell_words::quote(remote_path)))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(output.stdout.split_whitespace().next().map(str::to_string))
    }
}
