//! Chaos Channel Core Library
//!
//! Command execution channels used by chaos experiments to run OS commands and
//! resolve target processes. Provides functionality to:
//! - Run shell commands on the host or inside another process's namespaces
//! - Probe which OS utilities are available
//! - Resolve pids by listening port, command line or executable name
//! - Decode responses printed by nested invocations of the tool
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Response envelope, execution context and text parsers
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Resolution algorithms shared by every channel
//!
//! # Platform Support
//! - Linux: `/bin/sh`, `ss`, `ps`/`pgrep`, namespaces through `nsexec`
//! - macOS: `/bin/sh`, direct process listing
//! - Windows: `cmd /C`, direct process listing

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    decode_envelope, CodeType, Decoded, ExecContext, NamespaceTarget, OsFamily, PlatformProfile,
    Response,
};

// Re-export other commonly used types
pub use adapters::{LocalChannel, NsExecChannel, ProcessLookup, SystemExecutor};
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use ports::{Channel, CommandLine, ExecOutcome, Executor, ExitKind};
