//! Exit code constants for the hostlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, unbalanced release)
//! - 2: Lock acquisition or release failure
//! - 3: Transport failure (host unreachable, command timeout)
//! - 4: Host lock protocol failure (unexpected helper exit code or payload)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or release without acquire.
pub const USER_ERROR: i32 = 1;

/// Lock failure: a multi-host acquire or release could not complete.
pub const LOCK_FAILURE: i32 = 2;

/// Transport failure: a host could not be reached or a command timed out.
pub const TRANSPORT_FAILURE: i32 = 3;

/// Protocol failure: the host lock helper answered with something unexpected.
pub const PROTOCOL_FAILURE: i32 = 4;
