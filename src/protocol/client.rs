//! Helper invocations over a remote connection.

use super::codes::LockRetCode;
use super::metadata::LockMetadata;
use super::request::{HlpRequest, InfoTarget};
use crate::error::{HostLockError, Result};
use crate::remote::RemoteNode;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Exit code and output of one helper invocation.
#[derive(Debug, Clone)]
pub struct HlpOutcome {
    pub code: LockRetCode,
    pub stdout: String,
    pub stderr: String,
}

impl HlpOutcome {
    /// Human readable summary for error messages.
    pub fn describe(&self) -> String {
        format!(
            "exit_code: {} stdout: {} stderr: {}",
            self.code, self.stdout, self.stderr
        )
    }
}

/// Remote path of the helper installed for `uuid`.
///
/// Each lock owner gets its own copy so deleting it on release never
/// disturbs another owner's heartbeat.
pub fn remote_script_path(dir: &str, uuid: &str) -> String {
    format!("{}/host_lock{}", dir.trim_end_matches('/'), uuid.replace('-', ""))
}

/// Hex sha256 digest of a local file.
pub fn local_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        HostLockError::UserError(format!(
            "failed to read host lock helper '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Runs helper subcommands on one host.
pub struct HostLockClient<'a> {
    node: &'a dyn RemoteNode,
    script: String,
}

impl<'a> HostLockClient<'a> {
    pub fn new(node: &'a dyn RemoteNode, script: impl Into<String>) -> Self {
        Self {
            node,
            script: script.into(),
        }
    }

    pub fn host(&self) -> &str {
        self.node.host()
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Make sure the helper on the host is byte-identical to `local_script`.
    ///
    /// Returns `true` when the helper had to be (re)installed.
    pub async fn ensure_installed(&self, local_script: &Path) -> Result<bool> {
        let local_digest = local_sha256(local_script)?;
        let remote_digest = self.node.sha256(&self.script).await?;

        if remote_digest.as_deref() == Some(local_digest.as_str()) {
            return Ok(false);
        }

        info!(host = self.host(), script = %self.script, "installing host lock helper");
        if let Some((dir, _)) = self.script.rsplit_once('/')
            && !dir.is_empty()
        {
            self.node
                .exec_check(&format!("/bin/mkdir -p {}", shell_words::quote(dir)))
                .await?;
        }
        self.node.copy_file(local_script, &self.script).await?;
        self.node
            .exec_check(&format!("chmod 755 {}", shell_words::quote(&self.script)))
            .await?;
        Ok(true)
    }

    /// Whether the helper is still present. A missing helper means the lock
    /// was released from outside.
    pub async fn is_installed(&self) -> Result<bool> {
        self.node.file_exists(&self.script).await
    }

    /// Delete the helper from the host.
    pub async fn uninstall(&self) -> Result<()> {
        self.node
            .exec_check(&format!("/bin/rm -f {}", shell_words::quote(&self.script)))
            .await?;
        Ok(())
    }

    pub async fn call(&self, request: &HlpRequest) -> Result<HlpOutcome> {
        let command = request.to_command(&self.script);
        debug!(host = self.host(), subcommand = request.subcommand(), "host lock call");

        let output = self.node.exec(&command).await?;
        Ok(HlpOutcome {
            code: LockRetCode::from_code(output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    pub async fn acquire(
        &self,
        metadata: &LockMetadata,
        valid_for: Duration,
        scope: &str,
        uuid: &str,
    ) -> Result<HlpOutcome> {
        self.call(&HlpRequest::Acquire {
            lock_info: metadata.to_base64()?,
            valid_for_secs: valid_for.as_secs(),
            scope: scope.to_string(),
            uuid: uuid.to_string(),
        })
        .await
    }

    pub async fn refresh(&self, valid_for: Duration, scope: &str, uuid: &str) -> Result<HlpOutcome> {
        self.call(&HlpRequest::Refresh {
            valid_for_secs: valid_for.as_secs(),
            scope: scope.to_string(),
            uuid: uuid.to_string(),
        })
        .await
    }

    pub async fn release(&self, scope: &str, uuid: &str) -> Result<HlpOutcome> {
        self.call(&HlpRequest::Release {
            scope: scope.to_string(),
            uuid: uuid.to_string(),
        })
        .await
    }

    /// Metadata of the lock currently held for `target`.
    pub async fn get_info(&self, target: InfoTarget) -> Result<LockMetadata> {
        let outcome = self.call(&HlpRequest::GetInfo(target)).await?;
        if outcome.code != LockRetCode::NoError {
            return Err(HostLockError::protocol(
                self.host(),
                format!("get-info failed: {}", outcome.describe()),
            ));
        }
        LockMetadata::from_json(&outcome.stdout)
            .map_err(|e| HostLockError::protocol(self.host(), e.to_string()))
    }

    /// Remove every lock on the host regardless of owner.
    pub async fn remove_all(&self) -> Result<()> {
        let outcome = self.call(&HlpRequest::RemoveAll).await?;
        if outcome.code != LockRetCode::NoError {
            return Err(HostLockError::protocol(
                self.host(),
                format!("remove --all failed: {}", outcome.describe()),
            ));
        }
        Ok(())
    }
}
