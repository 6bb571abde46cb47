//! Subprocess executor and output classification.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::domain::{decode_envelope, CodeType, Decoded, ExecContext, Response};
use crate::ports::{CommandLine, ExecOutcome, Executor, ExitKind};

/// Netlink reply of a `tc`/`ip` rule that is already in place.
const NETLINK_EXISTS: &str = "RTNETLINK answers: File exists";

/// Executor spawning real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SystemExecutor {
    async fn execute(&self, line: &CommandLine, limit: Duration) -> ExecOutcome {
        let mut command = Command::new(&line.program);
        command.args(&line.args).stdin(Stdio::null()).kill_on_drop(true);

        let (child, reader) = match spawn_merged(command) {
            Ok(spawned) => spawned,
            Err(e) => {
                debug!(command = %line, error = %e, "Failed to spawn command");
                return ExecOutcome {
                    output: String::new(),
                    exit: ExitKind::SpawnFailed(e.to_string()),
                };
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let (status, output) = match tokio::time::timeout(limit, wait_merged(child, reader)).await {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => {
                return ExecOutcome {
                    output: String::new(),
                    exit: ExitKind::Failed(e.to_string()),
                }
            }
            Err(_) => {
                warn!(command = %line, limit_secs = limit.as_secs_f64(), "Command timed out, killed");
                return ExecOutcome {
                    output: String::new(),
                    exit: ExitKind::TimedOut(limit),
                };
            }
        };

        let exit = if status.success() {
            ExitKind::Success
        } else {
            ExitKind::Failed(exit_status_text(status))
        };
        ExecOutcome {
            output: String::from_utf8_lossy(&output).into_owned(),
            exit,
        }
    }
}

/// Read end of the pipe shared by the child's stdout and stderr.
#[cfg(unix)]
type MergedReader = tokio::net::unix::pipe::Receiver;

/// Spawn with stdout and stderr on one pipe, so the output keeps the order
/// in which the child wrote it.
#[cfg(unix)]
fn spawn_merged(mut command: Command) -> io::Result<(Child, MergedReader)> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use std::os::fd::AsRawFd;

    let (read, write) = nix::unistd::pipe()?;
    // Other children spawned meanwhile must not inherit the write end.
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    let write_err = write.try_clone()?;
    command
        .stdout(Stdio::from(write))
        .stderr(Stdio::from(write_err));
    let child = command.spawn()?;
    // The parent's write ends live in `command`; the reader sees EOF only
    // once they are closed.
    drop(command);
    let reader = MergedReader::from_owned_fd(read)?;
    Ok((child, reader))
}

#[cfg(unix)]
async fn wait_merged(mut child: Child, mut reader: MergedReader) -> io::Result<(ExitStatus, Vec<u8>)> {
    use tokio::io::AsyncReadExt;

    let mut output = Vec::new();
    let (read, status) = tokio::join!(reader.read_to_end(&mut output), child.wait());
    read?;
    Ok((status?, output))
}

#[cfg(not(unix))]
type MergedReader = ();

#[cfg(not(unix))]
fn spawn_merged(mut command: Command) -> io::Result<(Child, MergedReader)> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    Ok((command.spawn()?, ()))
}

/// Without a shared pipe, stderr is appended after stdout.
#[cfg(not(unix))]
async fn wait_merged(child: Child, _reader: MergedReader) -> io::Result<(ExitStatus, Vec<u8>)> {
    let output = child.wait_with_output().await?;
    let mut combined = output.stdout;
    combined.extend(output.stderr);
    Ok((output.status, combined))
}

fn exit_status_text(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return match signal {
                2 => "signal: interrupt".to_string(),
                9 => "signal: killed".to_string(),
                15 => "signal: terminated".to_string(),
                other => format!("signal: {}", other),
            };
        }
    }

    status.to_string()
}

/// Time a command may run: the ceiling, or less when the context deadline
/// is closer. Saturates at zero for an expired deadline.
pub fn effective_timeout(ctx: &ExecContext, ceiling: Duration) -> Duration {
    match ctx.deadline() {
        Some(deadline) => ceiling.min(deadline.saturating_duration_since(Instant::now())),
        None => ceiling,
    }
}

/// Turn an execution outcome into a response envelope.
///
/// `command` is the text reported in failure messages. When `self_invocation`
/// is set the OS error is left out of the message, since a nested invocation
/// reports its own error.
pub fn classify(command: &str, outcome: &ExecOutcome, self_invocation: bool) -> Response {
    let output = outcome.output.as_str();

    if !outcome.is_success() && output.contains(NETLINK_EXISTS) {
        return Response::from_code(CodeType::COMMAND_NETWORK_EXIST, false);
    }

    if !output.trim().is_empty() {
        if let Decoded::Structured(resp) = decode_envelope(output) {
            return resp;
        }
    }

    let Some(error) = outcome.error_text() else {
        return Response::success(output);
    };

    let mut message = output.to_string();
    if !self_invocation {
        message.push(' ');
        message.push_str(&error);
    }
    Response::fail_with(CodeType::OS_CMD_EXEC_FAILED, &[&command, &message])
}
