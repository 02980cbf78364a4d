//! Encoding and decoding of helper invocations.

use crate::error::{HostLockError, Result};

/// Which lock `get-info` reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoTarget {
    /// The lock currently held in a scope.
    Scope(String),
    /// The legacy, unscoped lock.
    Legacy,
}

/// A single helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlpRequest {
    Acquire {
        /// Base64 encoded JSON lock metadata.
        lock_info: String,
        valid_for_secs: u64,
        scope: String,
        uuid: String,
    },
    Refresh {
        valid_for_secs: u64,
        scope: String,
        uuid: String,
    },
    Release {
        scope: String,
        uuid: String,
    },
    GetInfo(InfoTarget),
    RemoveAll,
}

impl HlpRequest {
    /// Subcommand name as understood by the helper.
    pub fn subcommand(&self) -> &'static str {
        match self {
            HlpRequest::Acquire { .. } => "acquire",
            HlpRequest::Refresh { .. } => "refresh",
            HlpRequest::Release { .. } => "release",
            HlpRequest::GetInfo(_) => "get-info",
            HlpRequest::RemoveAll => "remove",
        }
    }

    /// Arguments following the helper path.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.subcommand().to_string()];
        match self {
            HlpRequest::Acquire {
                lock_info,
                valid_for_secs,
                scope,
                uuid,
            } => {
                args.extend([
                    "--lock-info".to_string(),
                    lock_info.clone(),
                    "--valid-for".to_string(),
                    valid_for_secs.to_string(),
                    scope.clone(),
                    uuid.clone(),
                ]);
            }
            HlpRequest::Refresh {
                valid_for_secs,
                scope,
                uuid,
            } => {
                args.extend([
                    "--valid-for".to_string(),
                    valid_for_secs.to_string(),
                    scope.clone(),
                    uuid.clone(),
                ]);
            }
            HlpRequest::Release { scope, uuid } => {
                args.extend([scope.clone(), uuid.clone()]);
            }
            HlpRequest::GetInfo(InfoTarget::Scope(scope)) => {
                args.extend(["--lock-scope".to_string(), scope.clone()]);
            }
            HlpRequest::GetInfo(InfoTarget::Legacy) => args.push("--legacy".to_string()),
            HlpRequest::RemoveAll => args.push("--all".to_string()),
        }
        args
    }

    /// Full shell command line invoking `script` with this request.
    pub fn to_command(&self, script: &str) -> String {
        let mut words = vec![script.to_string()];
        words.extend(self.to_args());
        shell_words::join(words)
    }

    /// Parse a command line produced by [`HlpRequest::to_command`].
    ///
    /// Returns the helper path and the decoded request.
    pub fn parse(command: &str) -> Result<(String, HlpRequest)> {
        let words = shell_words::split(command).map_err(|e| {
            HostLockError::UserError(format!("malformed helper command '{}': {}", command, e))
        })?;
        let malformed =
            || HostLockError::UserError(format!("malformed helper command '{}'", command));

        let mut words = words.into_iter();
        let script = words.next().ok_or_else(malformed)?;
        let subcommand = words.next().ok_or_else(malformed)?;
        let rest: Vec<String> = words.collect();
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let request = match (subcommand.as_str(), rest.as_slice()) {
            ("acquire", ["--lock-info", info, "--valid-for", secs, scope, uuid]) => {
                HlpRequest::Acquire {
                    lock_info: info.to_string(),
                    valid_for_secs: secs.parse().map_err(|_| malformed())?,
                    scope: scope.to_string(),
                    uuid: uuid.to_string(),
                }
            }
            ("refresh", ["--valid-for", secs, scope, uuid]) => HlpRequest::Refresh {
                valid_for_secs: secs.parse().map_err(|_| malformed())?,
                scope: scope.to_string(),
                uuid: uuid.to_string(),
            },
            ("release", [scope, uuid]) => HlpRequest::Release {
                scope: scope.to_string(),
                uuid: uuid.to_string(),
            },
            ("get-info", ["--lock-scope", scope]) => {
                HlpRequest::GetInfo(InfoTarget::Scope(scope.to_string()))
            }
            ("get-info", ["--legacy"]) => HlpRequest::GetInfo(InfoTarget::Legacy),
            ("remove", ["--all"]) => HlpRequest::RemoveAll,
            _ => return Err(malformed()),
        };

        Ok((script, request))
    }
}
