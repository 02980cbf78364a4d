//! Host lock protocol.
//!
//! Every host runs a small helper that adjudicates its own leases. The
//! orchestrator talks to it by executing the helper with a subcommand and
//! reading back the exit code and, for `get-info`, JSON on stdout:
//!
//! ```text
//! acquire --lock-info <base64 JSON> --valid-for <seconds> <scope> <uuid>
//! refresh --valid-for <seconds> <scope> <uuid>
//! release <scope> <uuid>
//! get-info --lock-scope <scope> | get-info --legacy
//! remove --all
//! ```
//!
//! Encoding and decoding of requests ([`HlpRequest`]), exit codes
//! ([`LockRetCode`]) and the lock payload ([`LockMetadata`]) are kept apart
//! from the transport so the executor can be swapped freely. [`HostLockClient`]
//! glues them to a [`RemoteNode`](crate::remote::RemoteNode).

mod client;
mod codes;
mod metadata;
mod request;


pub use client::{HlpOutcome, HostLockClient, local_sha256, remote_script_path};
pub use codes::LockRetCode;
pub use metadata::{ExtraInfo, LockMetadata};
pub(crate) use metadata::{NIL_UUID, run_uuid};
pub use request::{HlpRequest, InfoTarget};
