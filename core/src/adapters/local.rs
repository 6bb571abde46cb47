//! Channel running commands on the local host.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::exec::{classify, effective_timeout, SystemExecutor};
use super::procs::{self, ProcessLookup};
use crate::application::resolver;
use crate::config::ChannelConfig;
use crate::domain::{CodeType, ExecContext, OsFamily, PlatformProfile, ProcessQuery, Response};
use crate::error::{Error, Result};
use crate::ports::{Channel, CommandLine, Executor};

/// Runs `script args` through `/bin/sh -c` (or `cmd /C` on Windows).
///
/// The process lookup strategy is fixed at construction: direct listing where
/// `sysinfo` supports the host, `ps`/`pgrep` pipelines elsewhere.
pub struct LocalChannel<E: Executor = SystemExecutor> {
    config: Arc<ChannelConfig>,
    executor: Arc<E>,
    lookup: ProcessLookup,
    os: OsFamily,
    platform: OnceCell<PlatformProfile>,
}

impl LocalChannel<SystemExecutor> {
    pub fn new(config: Arc<ChannelConfig>) -> Self {
        Self::with_executor(config, Arc::new(SystemExecutor::new()))
    }
}

impl<E: Executor> LocalChannel<E> {
    pub fn with_executor(config: Arc<ChannelConfig>, executor: Arc<E>) -> Self {
        Self {
            config,
            executor,
            lookup: ProcessLookup::detect(),
            os: OsFamily::current(),
            platform: OnceCell::new(),
        }
    }

    /// Override the detected process lookup strategy.
    pub fn with_lookup(mut self, lookup: ProcessLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn config(&self) -> &Arc<ChannelConfig> {
        &self.config
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn lookup(&self) -> ProcessLookup {
        self.lookup
    }

    /// Shell invocation for `script args`.
    ///
    /// On Unix, spaces inside `script` are escaped so a path with spaces stays
    /// a single word.
    pub fn command_line(&self, script: &str, args: &str) -> CommandLine {
        if self.os == OsFamily::Windows {
            return CommandLine::new("cmd", ["/C".to_string(), format!("{} {}", script, args)]);
        }
        let script = script.replace(' ', r"\ ");
        CommandLine::new("/bin/sh", ["-c".to_string(), format!("{} {}", script, args)])
    }

    /// Execute `line` under the bounded deadline and classify the outcome.
    ///
    /// `command` is the text reported in failure messages.
    pub(crate) async fn execute(
        &self,
        ctx: &ExecContext,
        command: &str,
        line: &CommandLine,
        self_invocation: bool,
    ) -> Response {
        let limit = effective_timeout(ctx, self.config.exec_timeout());
        debug!(
            request_id = %ctx.request_id(),
            command = %line,
            limit_secs = limit.as_secs_f64(),
            "Executing command"
        );

        let outcome = self.executor.execute(line, limit).await;
        let response = classify(command, &outcome, self_invocation);
        debug!(
            request_id = %ctx.request_id(),
            code = response.code,
            success = response.success,
            output = %outcome.output.trim_end(),
            "Command finished"
        );
        response
    }

    /// Failure for a tool binary that is referenced but not installed.
    pub(crate) fn missing_binary(&self, ctx: &ExecContext, script: &str) -> Option<Response> {
        if Path::new(script).exists() {
            return None;
        }
        warn!(request_id = %ctx.request_id(), script = script, "Tool binary not found");
        Some(Response::fail_with(CodeType::BINARY_FILE_NOT_FOUND, &[&script]))
    }

    fn query<'a>(&'a self, ctx: &'a ExecContext, keyword: &'a str) -> ProcessQuery<'a> {
        ProcessQuery::new(keyword, ctx, &self.config.self_markers, std::process::id())
    }
}

fn non_blank<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} is blank", what)));
    }
    Ok(value)
}

impl<E: Executor> Channel for LocalChannel<E> {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn run(&self, ctx: &ExecContext, script: &str, args: &str) -> Response {
        if self.config.looks_like_installed_binary(script) {
            if let Some(response) = self.missing_binary(ctx, script) {
                return response;
            }
        }

        let line = self.command_line(script, args);
        let command = line.args.last().cloned().unwrap_or_default();
        self.execute(ctx, &command, &line, self.config.is_self_command(script))
            .await
    }

    fn script_path(&self) -> &Path {
        &self.config.program_path
    }

    async fn is_command_available(&self, ctx: &ExecContext, name: &str) -> bool {
        let response = if self.os == OsFamily::Windows {
            self.run(ctx, "where", name).await
        } else {
            self.run(ctx, "command", &format!("-v {}", name)).await
        };
        response.success
    }

    async fn is_all_commands_available(
        &self,
        ctx: &ExecContext,
        names: &[&str],
    ) -> std::result::Result<(), Response> {
        resolver::is_all_commands_available(self, ctx, names).await
    }

    async fn pids_by_process_name(&self, ctx: &ExecContext, keyword: &str) -> Result<Vec<String>> {
        if self.lookup == ProcessLookup::Pipeline {
            return resolver::pids_by_process_name(self, ctx, keyword, &self.config.self_markers)
                .await;
        }

        let keyword = non_blank(keyword, "process keyword")?;
        let processes = procs::snapshot().await?;
        let pids = self.query(ctx, keyword).filter_by_cmdline(&processes);
        debug!(request_id = %ctx.request_id(), keyword = keyword, pids = ?pids, "Resolved pids by process name");
        Ok(pids)
    }

    async fn pids_by_process_cmd_name(&self, ctx: &ExecContext, name: &str) -> Result<Vec<String>> {
        if self.lookup == ProcessLookup::Pipeline {
            return resolver::pids_by_process_cmd_name(self, ctx, name, &self.config.self_markers)
                .await;
        }

        let name = non_blank(name, "processName")?;
        let processes = procs::snapshot().await?;
        let pids = self.query(ctx, name).filter_by_name(&processes);
        debug!(request_id = %ctx.request_id(), name = name, pids = ?pids, "Resolved pids by command name");
        Ok(pids)
    }

    /// Remembered after the first successful detection only.
    async fn platform(&self, ctx: &ExecContext) -> PlatformProfile {
        if let Some(profile) = self.platform.get() {
            return *profile;
        }
        let detected =
            resolver::probe_platform(self, ctx, self.os, &self.config.os_release_path, true).await;
        match detected {
            Some(profile) => {
                let _ = self.platform.set(profile);
                profile
            }
            None => PlatformProfile::standard(self.os),
        }
    }

    fn process_exists(&self, pid: &str) -> Result<bool> {
        procs::process_exists(pid)
    }

    fn pid_user(&self, pid: &str) -> Result<String> {
        procs::pid_user(pid)
    }

    async fn pids_by_local_port(&self, ctx: &ExecContext, port: &str) -> Result<Vec<String>> {
        resolver::pids_by_local_port(self, ctx, port).await
    }

    async fn pids_by_local_ports(
        &self,
        ctx: &ExecContext,
        ports: &[String],
    ) -> Result<Vec<String>> {
        resolver::pids_by_local_ports(self, ctx, ports).await
    }
}
