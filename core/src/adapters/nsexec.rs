//! Channel running commands inside another process's namespaces.
//!
//! Commands go through the `nsexec` helper shipped with the tool:
//!
//! ```text
//! <bin>/nsexec -t <pid> [-p] [-m] [-n] -- /bin/sh -c "<script> <args>"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::exec::SystemExecutor;
use super::local::LocalChannel;
use crate::application::resolver;
use crate::config::ChannelConfig;
use crate::domain::{CodeType, ExecContext, NamespaceTarget, OsFamily, PlatformProfile, Response};
use crate::error::Result;
use crate::ports::{Channel, CommandLine, Executor};

/// Namespace-entering channel.
///
/// Every lookup (`ps`, `pgrep`, `ss`, `awk`) runs inside the target namespace.
/// Platform profiles are remembered per target pid, and only once detection
/// inside that namespace succeeded.
pub struct NsExecChannel<E: Executor = SystemExecutor> {
    local: LocalChannel<E>,
    platforms: Mutex<HashMap<u32, PlatformProfile>>,
}

impl NsExecChannel<SystemExecutor> {
    pub fn new(config: Arc<ChannelConfig>) -> Self {
        Self::from_local(LocalChannel::new(config))
    }
}

impl<E: Executor> NsExecChannel<E> {
    pub fn with_executor(config: Arc<ChannelConfig>, executor: Arc<E>) -> Self {
        Self::from_local(LocalChannel::with_executor(config, executor))
    }

    pub fn from_local(local: LocalChannel<E>) -> Self {
        Self {
            local,
            platforms: Mutex::new(HashMap::new()),
        }
    }

    pub fn local(&self) -> &LocalChannel<E> {
        &self.local
    }

    fn config(&self) -> &ChannelConfig {
        self.local.config()
    }

    pub fn helper_path(&self) -> PathBuf {
        self.config().nsexec_path()
    }

    /// Helper invocation running `script args` in `target`'s namespaces.
    pub fn command_line(&self, target: &NamespaceTarget, script: &str, args: &str) -> CommandLine {
        let mut argv = vec!["-t".to_string(), target.pid.to_string()];
        if target.enter_pid {
            argv.push("-p".to_string());
        }
        if target.enter_mount {
            argv.push("-m".to_string());
        }
        if target.enter_net {
            argv.push("-n".to_string());
        }
        argv.extend(["--", "/bin/sh", "-c"].map(String::from));

        let payload = if args.is_empty() {
            script.to_string()
        } else {
            format!("{} {}", script, args)
        };
        argv.push(payload);

        CommandLine::new(self.helper_path().to_string_lossy(), argv)
    }
}

impl<E: Executor> Channel for NsExecChannel<E> {
    fn name(&self) -> &'static str {
        "nsexec"
    }

    async fn run(&self, ctx: &ExecContext, script: &str, args: &str) -> Response {
        let Some(target) = ctx.namespace() else {
            debug!(request_id = %ctx.request_id(), script = script, "No namespace target in context");
            return Response::fail_with(CodeType::COMMAND_ILLEGAL, &[&script]);
        };

        let self_invocation = self.config().is_self_command(script);
        if self_invocation {
            if let Some(response) = self.local.missing_binary(ctx, script) {
                return response;
            }
        }

        let line = self.command_line(target, script, args);
        self.local
            .execute(ctx, &line.to_string(), &line, self_invocation)
            .await
    }

    fn script_path(&self) -> &Path {
        self.local.script_path()
    }

    /// Requires the `command -v` output to name the command, since a
    /// namespace without the binary may still exit zero through the helper.
    async fn is_command_available(&self, ctx: &ExecContext, name: &str) -> bool {
        let response = self.run(ctx, "command", &format!("-v {}", name)).await;
        response.success && response.result_str().is_some_and(|out| out.contains(name))
    }

    async fn is_all_commands_available(
        &self,
        ctx: &ExecContext,
        names: &[&str],
    ) -> std::result::Result<(), Response> {
        resolver::is_all_commands_available(self, ctx, names).await
    }

    async fn pids_by_process_name(&self, ctx: &ExecContext, keyword: &str) -> Result<Vec<String>> {
        resolver::pids_by_process_name(self, ctx, keyword, &self.config().self_markers).await
    }

    async fn pids_by_process_cmd_name(&self, ctx: &ExecContext, name: &str) -> Result<Vec<String>> {
        resolver::pids_by_process_cmd_name(self, ctx, name, &self.config().self_markers).await
    }

    /// Without a target nothing can run, so the standard dialect is returned
    /// and nothing is remembered.
    async fn platform(&self, ctx: &ExecContext) -> PlatformProfile {
        let Some(target) = ctx.namespace() else {
            return PlatformProfile::standard(OsFamily::Linux);
        };
        let cached = self.platforms.lock().get(&target.pid).copied();
        if let Some(profile) = cached {
            return profile;
        }

        let detected = resolver::probe_platform(
            self,
            ctx,
            OsFamily::Linux,
            &self.config().os_release_path,
            false,
        )
        .await;
        match detected {
            Some(profile) => {
                self.platforms.lock().insert(target.pid, profile);
                profile
            }
            None => PlatformProfile::standard(OsFamily::Linux),
        }
    }

    fn process_exists(&self, pid: &str) -> Result<bool> {
        self.local.process_exists(pid)
    }

    fn pid_user(&self, pid: &str) -> Result<String> {
        self.local.pid_user(pid)
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
