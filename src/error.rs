//! Error types for hostlock.
//!
//! Uses thiserror for derive macros. Contention on a host is never an error;
//! only unexpected protocol outcomes and transport failures surface here.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for host lock operations.
#[derive(Error, Debug)]
pub enum HostLockError {
    /// Invalid arguments, unreadable files or other caller-side problems.
    #[error("{0}")]
    UserError(String),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A host could not be reached or a remote command could not be run.
    #[error("transport failure on {host}: {message}")]
    Transport { host: String, message: String },

    /// The host lock helper answered with an unexpected exit code or payload.
    #[error("host lock protocol failure on {host}: {message}")]
    Protocol { host: String, message: String },

    /// `release` was called more times than `acquire`.
    #[error("trying to release an unacquired lock")]
    NotAcquired,

    /// A multi-host acquire failed.
    #[error("remote lock acquisition failed: hosts: {hosts:?}; scope: {scope}; uuid: {uuid}; error: {source}")]
    Acquire {
        scope: String,
        uuid: String,
        hosts: Vec<String>,
        #[source]
        source: Box<HostLockError>,
    },

    /// A multi-host release failed.
    #[error("remote lock release failed: hosts: {hosts:?}; scope: {scope}; uuid: {uuid}; error: {source}")]
    Release {
        scope: String,
        uuid: String,
        hosts: Vec<String>,
        #[source]
        source: Box<HostLockError>,
    },

    /// A command run under the lock exited unsuccessfully.
    #[error("command '{command}' exited with code {code}")]
    CommandFailed { command: String, code: i32 },
}

impl HostLockError {
    /// Build a transport error for `host`.
    pub fn transport(host: impl Into<String>, message: impl Into<String>) -> Self {
        HostLockError::Transport {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Build a protocol error for `host`.
    pub fn protocol(host: impl Into<String>, message: impl Into<String>) -> Self {
        HostLockError::Protocol {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            HostLockError::UserError(_) => exit_codes::USER_ERROR,
            HostLockError::Config(_) => exit_codes::USER_ERROR,
            HostLockError::NotAcquired => exit_codes::USER_ERROR,
            HostLockError::Transport { .. } => exit_codes::TRANSPORT_FAILURE,
            HostLockError::Protocol { .. } => exit_codes::PROTOCOL_FAILURE,
            HostLockError::Acquire { .. } => exit_codes::LOCK_FAILURE,
            HostLockError::Release { .. } => exit_codes::LOCK_FAILURE,
            HostLockError::CommandFailed { code, .. } => *code,
        }
    }
}

/// Result type alias for host lock operations.
pub type Result<T> = std::result::Result<T, HostLockError>;
