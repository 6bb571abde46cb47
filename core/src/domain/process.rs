//! Process matching rules shared by both lookup strategies.
//!
//! The direct strategy filters [`ProcessSnapshot`]s in memory; the pipeline
//! strategy renders the same rules as a `ps`/`pgrep | grep | awk` command line.

use super::context::ExecContext;

/// Name and command line of one live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
}

impl ProcessSnapshot {
    pub fn new(pid: u32, name: impl Into<String>, cmdline: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            cmdline: cmdline.into(),
        }
    }
}

/// Matching rules derived from a context.
#[derive(Debug, Clone)]
pub struct ProcessQuery<'a> {
    keyword: &'a str,
    also_contains: Option<&'a str>,
    process_command: Option<&'a str>,
    excludes: Vec<&'a str>,
    own_pid: u32,
}

impl<'a> ProcessQuery<'a> {
    /// Rules for `keyword`, with the context excludes plus `self_markers`.
    pub fn new(
        keyword: &'a str,
        ctx: &'a ExecContext,
        self_markers: &'a [String],
        own_pid: u32,
    ) -> Self {
        let excludes = ctx
            .exclude_processes()
            .iter()
            .chain(self_markers)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            keyword,
            also_contains: ctx.process_filter(),
            process_command: ctx.process_command(),
            excludes,
            own_pid,
        }
    }

    pub fn keyword(&self) -> &str {
        self.keyword
    }

    fn is_excluded(&self, cmdline: &str) -> bool {
        self.excludes.iter().any(|ex| cmdline.contains(ex))
    }

    /// Keyword, secondary filter and process command are all substrings of
    /// the full command line.
    pub fn matches_cmdline(&self, process: &ProcessSnapshot) -> bool {
        let required = [Some(self.keyword), self.also_contains, self.process_command];
        required
            .into_iter()
            .flatten()
            .all(|part| process.cmdline.contains(part))
            && !self.is_excluded(&process.cmdline)
            && process.pid != self.own_pid
    }

    /// Keyword equals the executable name.
    pub fn matches_name(&self, process: &ProcessSnapshot) -> bool {
        process.name == self.keyword
            && process.pid != self.own_pid
            && !self.is_excluded(&process.cmdline)
    }

    pub fn filter_by_cmdline(&self, processes: &[ProcessSnapshot]) -> Vec<String> {
        collect_pids(processes, |p| self.matches_cmdline(p))
    }

    pub fn filter_by_name(&self, processes: &[ProcessSnapshot]) -> Vec<String> {
        collect_pids(processes, |p| self.matches_name(p))
    }
}

fn collect_pids(
    processes: &[ProcessSnapshot],
    matches: impl Fn(&ProcessSnapshot) -> bool,
) -> Vec<String> {
    processes
        .iter()
        .filter(|p| matches(p))
        .map(|p| p.pid.to_string())
        .collect()
}

// ============================================================================
// Pipelines
// ============================================================================

fn exclude_greps(ctx: &ExecContext) -> String {
    ctx.exclude_processes()
        .iter()
        .map(|name| format!("| grep -v -w {}", name))
        .collect()
}

fn marker_greps(self_markers: &[String]) -> String {
    self_markers
        .iter()
        .map(|marker| format!(" | grep -v -w {}", marker))
        .collect()
}

/// Arguments for `ps` resolving pids whose command line contains `keyword`.
pub fn ps_pipeline_args(
    ps_args: &str,
    keyword: &str,
    ctx: &ExecContext,
    self_markers: &[String],
) -> String {
    let keyword = if keyword.starts_with('-') {
        format!(r"\{}", keyword)
    } else {
        keyword.to_string()
    };
    let other = ctx
        .process_filter()
        .map(|p| format!(r#"| grep "{}""#, p))
        .unwrap_or_default();
    let command = ctx
        .process_command()
        .map(|c| format!(r#" | grep "{}""#, c))
        .unwrap_or_default();
    format!(
        r#"{} | grep "{}" {}{} {} | grep -v -w grep{} | awk '{{print $2}}' | tr '\n' ' '"#,
        ps_args,
        keyword,
        other,
        command,
        exclude_greps(ctx),
        marker_greps(self_markers),
    )
}

/// Arguments for `pgrep` resolving pids whose executable is `name`.
pub fn pgrep_pipeline_args(name: &str, ctx: &ExecContext, self_markers: &[String]) -> String {
    format!(
        r#"-l {} {}{} | awk '{{print $1}}' | tr '\n' ' '"#,
        name,
        exclude_greps(ctx),
        marker_greps(self_markers),
    )
}

/// Split a space separated pid column and drop `own_pid`.
pub fn parse_pid_column(text: &str, own_pid: u32) -> Vec<String> {
    let own = own_pid.to_string();
    text.split_whitespace()
        .filter(|pid| *pid != own)
        .map(str::to_string)
        .collect()
}
