//! Command channel port (interface).

use std::future::Future;
use std::path::Path;

use crate::domain::{ExecContext, PlatformProfile, Response};
use crate::error::Result;

/// Port for running commands and resolving process identities.
///
/// Implementations decide *where* a command runs (the host, another process's
/// namespaces); the resolution algorithms in `application` are written once
/// against this trait.
pub trait Channel: Send + Sync {
    /// Unique channel name.
    fn name(&self) -> &'static str;

    /// Run `script args` as a shell command.
    ///
    /// Execution is bounded by the configured ceiling (60 seconds by default)
    /// or by the context deadline when that is earlier.
    fn run(
        &self,
        ctx: &ExecContext,
        script: &str,
        args: &str,
    ) -> impl Future<Output = Response> + Send;

    /// Directory used to locate co-located helper binaries.
    fn script_path(&self) -> &Path;

    /// True iff `command -v <name>` succeeds.
    fn is_command_available(
        &self,
        ctx: &ExecContext,
        name: &str,
    ) -> impl Future<Output = bool> + Send;

    /// Check `names` in order, failing on the first missing command.
    ///
    /// `Err` carries the command specific "not found" envelope.
    fn is_all_commands_available(
        &self,
        ctx: &ExecContext,
        names: &[&str],
    ) -> impl Future<Output = std::result::Result<(), Response>> + Send;

    /// Pids whose full command line contains `keyword`.
    fn pids_by_process_name(
        &self,
        ctx: &ExecContext,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Pids whose executable name equals `name`.
    fn pids_by_process_cmd_name(
        &self,
        ctx: &ExecContext,
        name: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Dialect facts of the host this channel executes on, remembered after
    /// the first successful detection.
    fn platform(&self, ctx: &ExecContext) -> impl Future<Output = PlatformProfile> + Send;

    /// `ps` arguments matching the host dialect.
    fn ps_args(&self, ctx: &ExecContext) -> impl Future<Output = String> + Send {
        async move { self.platform(ctx).await.ps_args().to_string() }
    }

    /// Whether the host runs the reduced Alpine/busybox userland.
    fn is_alpine_platform(&self, ctx: &ExecContext) -> impl Future<Output = bool> + Send {
        async move { self.platform(ctx).await.alpine }
    }

    /// Whether a process with `pid` is alive.
    fn process_exists(&self, pid: &str) -> Result<bool>;

    /// Name of the user owning `pid`.
    fn pid_user(&self, pid: &str) -> Result<String>;

    /// Pids listening on `port`; empty when nothing listens.
    fn pids_by_local_port(
        &self,
        ctx: &ExecContext,
        port: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Pids listening on any of `ports`, concatenated in input order.
    ///
    /// The first failing port aborts the whole batch.
    fn pids_by_local_ports(
        &self,
        ctx: &ExecContext,
        ports: &[String],
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}
