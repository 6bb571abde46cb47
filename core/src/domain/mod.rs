//! Domain layer - Pure data models and text parsers.
//!
//! This module contains the response envelope, the execution context and the
//! parsers for `ss`/`ps` output. These types have no I/O dependencies and can
//! be tested in isolation.

mod context;
mod platform;
mod process;
mod response;
mod socket;

// Re-export all domain types
pub use context::{ExecContext, NamespaceTarget};
pub use platform::{
    OsFamily, PlatformProfile, OS_RELEASE_ID_AWK, PS_ARGS_BUSYBOX, PS_ARGS_STANDARD,
};
pub use process::{
    parse_pid_column, pgrep_pipeline_args, ps_pipeline_args, ProcessQuery, ProcessSnapshot,
};
pub use response::{decode_envelope, CodeType, Decoded, Response, WIRE_VERSION};
pub use socket::{parse_ss_pids, ss_listen_args};
