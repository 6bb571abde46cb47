//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`:
//! the tokio subprocess executor, the local and namespace-entering channels,
//! and direct process listing through `sysinfo`.

mod exec;
mod local;
#[cfg(any(test, feature = "test-utils"))]
mod mock;
mod nsexec;
pub mod procs;

// Re-export main types for convenience
pub use exec::{classify, effective_timeout, SystemExecutor};
pub use local::LocalChannel;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockChannel, MockExecutor};
pub use nsexec::NsExecChannel;
pub use procs::ProcessLookup;
