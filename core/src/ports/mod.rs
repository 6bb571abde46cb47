//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod channel;
mod executor;

pub use channel::Channel;
pub use executor::{CommandLine, ExecOutcome, Executor, ExitKind};
