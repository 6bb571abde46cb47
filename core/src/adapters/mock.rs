//! Test doubles for the channel and executor ports.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use super::procs::parse_pid;
use crate::application::resolver;
use crate::domain::{CodeType, ExecContext, OsFamily, PlatformProfile, Response};
use crate::error::{Error, Result};
use crate::ports::{Channel, CommandLine, ExecOutcome, Executor};

// ============================================================================
// MockChannel
// ============================================================================

/// Channel answering commands from a script instead of a shell.
///
/// Every `run` is recorded as `"<script> <args>"`. Availability checks are
/// recorded separately and succeed unless the command was marked missing.
pub struct MockChannel {
    responses: Vec<(String, Response)>,
    fallback: Option<Response>,
    expected: Option<Vec<String>>,
    missing: HashSet<String>,
    profile: PlatformProfile,
    processes: HashMap<u32, String>,
    self_markers: Vec<String>,
    script_path: PathBuf,
    invocations: Mutex<Vec<String>>,
    availability_checks: Mutex<Vec<String>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            fallback: None,
            expected: None,
            missing: HashSet::new(),
            profile: PlatformProfile::standard(OsFamily::Linux),
            processes: HashMap::new(),
            self_markers: vec![
                "chaos_killprocess".to_string(),
                "chaos_stopprocess".to_string(),
            ],
            script_path: PathBuf::from("/opt/chaosblade"),
            invocations: Mutex::new(Vec::new()),
            availability_checks: Mutex::new(Vec::new()),
        }
    }

    /// Answer the exact command `"<script> <args>"` with `response`.
    pub fn respond(mut self, command: impl Into<String>, response: Response) -> Self {
        self.responses.push((command.into(), response));
        self
    }

    /// Answer every command without a dedicated response.
    pub fn respond_any(mut self, response: Response) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Panic when the n-th command differs from `commands[n]`.
    pub fn expect_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = Some(commands.into_iter().map(Into::into).collect());
        self
    }

    pub fn missing_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_platform(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Register a live process owned by `user`.
    pub fn with_process(mut self, pid: u32, user: impl Into<String>) -> Self {
        self.processes.insert(pid, user.into());
        self
    }

    /// Commands passed to `run`, in call order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }

    /// Names passed to `is_command_available`, in call order.
    pub fn availability_checks(&self) -> Vec<String> {
        self.availability_checks.lock().clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, _ctx: &ExecContext, script: &str, args: &str) -> Response {
        let command = format!("{} {}", script, args);
        let index = {
            let mut invocations = self.invocations.lock();
            invocations.push(command.clone());
            invocations.len() - 1
        };

        if let Some(expected) = self.expected.as_ref() {
            match expected.get(index) {
                Some(want) if *want == command => {}
                Some(want) => panic!("unexpected command: {}, expected command: {}", command, want),
                None => panic!("unexpected command: {}, no more commands expected", command),
            }
        }

        self.responses
            .iter()
            .find(|(cmd, _)| *cmd == command)
            .map(|(_, resp)| resp.clone())
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| {
                Response::fail_with(CodeType::COMMAND_ILLEGAL, &[&format!("unscripted `{}`", command)])
            })
    }

    fn script_path(&self) -> &Path {
        &self.script_path
    }

    async fn is_command_available(&self, _ctx: &ExecContext, name: &str) -> bool {
        self.availability_checks.lock().push(name.to_string());
        !self.missing.contains(name)
    }

    async fn is_all_commands_available(
        &self,
        ctx: &ExecContext,
        names: &[&str],
    ) -> std::result::Result<(), Response> {
        resolver::is_all_commands_available(self, ctx, names).await
    }

    async fn pids_by_process_name(&self, ctx: &ExecContext, keyword: &str) -> Result<Vec<String>> {
        resolver::pids_by_process_name(self, ctx, keyword, &self.self_markers).await
    }

    async fn pids_by_process_cmd_name(&self, ctx: &ExecContext, name: &str) -> Result<Vec<String>> {
        resolver::pids_by_process_cmd_name(self, ctx, name, &self.self_markers).await
    }

    async fn platform(&self, _ctx: &ExecContext) -> PlatformProfile {
        self.profile
    }

    fn process_exists(&self, pid: &str) -> Result<bool> {
        Ok(self.processes.contains_key(&parse_pid(pid)?))
    }

    fn pid_user(&self, pid: &str) -> Result<String> {
        let pid = parse_pid(pid)?;
        self.processes
            .get(&pid)
            .cloned()
            .ok_or(Error::ProcessNotFound(pid))
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

// ============================================================================
// MockExecutor
// ============================================================================

/// Executor that records command lines and replays queued outcomes.
///
/// Once the queue is drained every execution succeeds with empty output.
#[derive(Default)]
pub struct MockExecutor {
    outcomes: Mutex<VecDeque<ExecOutcome>>,
    executed: Mutex<Vec<(CommandLine, Duration)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next execution.
    pub fn push(self, outcome: ExecOutcome) -> Self {
        self.outcomes.lock().push_back(outcome);
        self
    }

    /// Every command line executed so far with its time limit.
    pub fn executed(&self) -> Vec<(CommandLine, Duration)> {
        self.executed.lock().clone()
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().len()
    }
}

impl Executor for MockExecutor {
    async fn execute(&self, line: &CommandLine, limit: Duration) -> ExecOutcome {
        self.executed.lock().push((line.clone(), limit));
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| ExecOutcome::success(""))
    }
}
