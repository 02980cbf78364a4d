//! Exit codes of the host lock helper.

use std::fmt;

/// Exit code returned by the host lock helper.
///
/// Not every non-zero code is an error: [`LockRetCode::ExpiredAndAcquired`]
/// means the call succeeded after reclaiming an expired lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRetCode {
    /// Acquired, released or refreshed.
    NoError,
    /// Generic failure.
    Error,
    /// Blocked by an existing, valid lock in the requested scope.
    NotAcquired,
    /// Blocked by an existing lock written in legacy (unscoped) mode.
    NotAcquiredLegacyMode,
    /// An expired lock was cleaned up and the lease now belongs to the caller.
    ExpiredAndAcquired,
    /// No lock found for the caller.
    NotFound,
    /// The helper could not open its lock file.
    FileOpenError,
    /// Any code outside the vocabulary.
    Other(i32),
}

impl LockRetCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => LockRetCode::NoError,
            1 => LockRetCode::Error,
            2 => LockRetCode::NotAcquired,
            3 => LockRetCode::NotAcquiredLegacyMode,
            4 => LockRetCode::ExpiredAndAcquired,
            5 => LockRetCode::NotFound,
            126 => LockRetCode::FileOpenError,
            other => LockRetCode::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            LockRetCode::NoError => 0,
            LockRetCode::Error => 1,
            LockRetCode::NotAcquired => 2,
            LockRetCode::NotAcquiredLegacyMode => 3,
            LockRetCode::ExpiredAndAcquired => 4,
            LockRetCode::NotFound => 5,
            LockRetCode::FileOpenError => 126,
            LockRetCode::Other(code) => *code,
        }
    }

    /// Whether an acquire with this code should wait for the holder.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            LockRetCode::NotAcquired
                | LockRetCode::NotAcquiredLegacyMode
                | LockRetCode::FileOpenError
        )
    }

    /// Whether an acquire with this code now holds the lease.
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockRetCode::NoError | LockRetCode::ExpiredAndAcquired)
    }

    /// Whether a release with this code left the host without our lock.
    pub fn is_released(&self) -> bool {
        matches!(self, LockRetCode::NoError | LockRetCode::NotFound)
    }
}

impl fmt::Display for LockRetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockRetCode::NoError => "no error",
            LockRetCode::Error => "error",
            LockRetCode::NotAcquired => "not acquired",
            LockRetCode::NotAcquiredLegacyMode => "not acquired (legacy mode)",
            LockRetCode::ExpiredAndAcquired => "expired and acquired",
            LockRetCode::NotFound => "not found",
            LockRetCode::FileOpenError => "lock file open error",
            LockRetCode::Other(_) => "unexpected",
        };
        write!(f, "{} ({})", self.code(), name)
    }
}
