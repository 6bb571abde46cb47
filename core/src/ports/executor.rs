//! Subprocess execution port (interface).

use std::fmt;
use std::time::Duration;

/// A program and its argument vector, assembled just before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a subprocess ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// Exit status zero.
    Success,
    /// Non-zero exit; holds the OS error text, e.g. `exit status 1`.
    Failed(String),
    /// Killed after running past its deadline.
    TimedOut(Duration),
    /// The program could not be started.
    SpawnFailed(String),
}

/// Combined output and exit state of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Standard output followed by standard error.
    pub output: String,
    pub exit: ExitKind,
}

impl ExecOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit: ExitKind::Success,
        }
    }

    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit: ExitKind::Failed(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit == ExitKind::Success
    }

    /// OS level error text, `None` on success.
    pub fn error_text(&self) -> Option<String> {
        match &self.exit {
            ExitKind::Success => None,
            ExitKind::Failed(err) | ExitKind::SpawnFailed(err) => Some(err.clone()),
            ExitKind::TimedOut(limit) => Some(format!(
                "signal: killed, command timed out after {}s",
                limit.as_secs_f64()
            )),
        }
    }
}

/// Port for spawning subprocesses.
///
/// Implementations must enforce `limit` and kill the subprocess once it is
/// exceeded.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        line: &CommandLine,
        limit: Duration,
    ) -> impl std::future::Future<Output = ExecOutcome> + Send;
}
