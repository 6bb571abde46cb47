//! Request-scoped execution context.
//!
//! Carries the filters and namespace target an operation runs with. Derive a
//! narrower context with `ctx.clone().with_*(..)`; the parent is untouched.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// The process whose namespaces a command should enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceTarget {
    /// Target process id (`-t`).
    pub pid: u32,
    /// Enter the pid namespace (`-p`).
    pub enter_pid: bool,
    /// Enter the mount namespace (`-m`).
    pub enter_mount: bool,
    /// Enter the network namespace (`-n`).
    pub enter_net: bool,
}

impl NamespaceTarget {
    /// Target `pid` without entering any namespace yet.
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            enter_pid: false,
            enter_mount: false,
            enter_net: false,
        }
    }

    pub fn pid_ns(mut self, enter: bool) -> Self {
        self.enter_pid = enter;
        self
    }

    pub fn mount_ns(mut self, enter: bool) -> Self {
        self.enter_mount = enter;
        self
    }

    pub fn net_ns(mut self, enter: bool) -> Self {
        self.enter_net = enter;
        self
    }
}

/// Inputs shared by every `run` and resolver call of one operation.
#[derive(Debug, Clone)]
pub struct ExecContext {
    request_id: Uuid,
    deadline: Option<Instant>,
    namespace: Option<NamespaceTarget>,
    process_filter: Option<String>,
    exclude_processes: Vec<String>,
    process_command: Option<String>,
    destroy: bool,
}

impl ExecContext {
    /// Fresh context with a new request id and no deadline.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4())
    }

    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            deadline: None,
            namespace: None,
            process_filter: None,
            exclude_processes: Vec::new(),
            process_command: None,
            destroy: false,
        }
    }

    /// Set an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now. An earlier existing deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_namespace(mut self, target: NamespaceTarget) -> Self {
        self.namespace = Some(target);
        self
    }

    /// Secondary keyword a matching process must also contain.
    pub fn with_process_filter(mut self, process: impl Into<String>) -> Self {
        self.process_filter = Some(process.into());
        self
    }

    /// Append names of processes to skip. Blank names are dropped.
    pub fn with_excluded_processes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_processes.extend(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_string())
                .filter(|name| !name.is_empty()),
        );
        self
    }

    /// Append a comma separated exclude list, e.g. `"java, nginx"`.
    pub fn with_exclude_process_list(self, list: &str) -> Self {
        self.with_excluded_processes(list.split(','))
    }

    /// Executable name a matching process must contain.
    pub fn with_process_command(mut self, command: impl Into<String>) -> Self {
        self.process_command = Some(command.into());
        self
    }

    /// Mark the operation as a destroy (recovery) operation.
    pub fn as_destroy(mut self) -> Self {
        self.destroy = true;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn namespace(&self) -> Option<&NamespaceTarget> {
        self.namespace.as_ref()
    }

    /// Secondary keyword filter, if set and not blank.
    pub fn process_filter(&self) -> Option<&str> {
        non_blank(self.process_filter.as_deref())
    }

    pub fn exclude_processes(&self) -> &[String] {
        &self.exclude_processes
    }

    /// Executable name filter, if set and not blank.
    pub fn process_command(&self) -> Option<&str> {
        non_blank(self.process_command.as_deref())
    }

    pub fn is_destroy(&self) -> bool {
        self.destroy
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_context_leaves_parent_untouched() {
        let parent = ExecContext::new().with_process_filter("java");
        let child = parent
            .clone()
            .with_namespace(NamespaceTarget::new(42).net_ns(true))
            .as_destroy();

        assert!(parent.namespace().is_none());
        assert!(!parent.is_destroy());
        assert_eq!(child.namespace().map(|t| t.pid), Some(42));
        assert!(child.is_destroy());
        assert_eq!(child.process_filter(), Some("java"));
        assert_eq!(child.request_id(), parent.request_id());
    }

    #[test]
    fn test_exclude_list_is_split_and_trimmed() {
        let ctx = ExecContext::new().with_exclude_process_list(" nginx, ,java,,");
        assert_eq!(ctx.exclude_processes(), &["nginx", "java"]);
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let ctx = ExecContext::new().with_timeout(Duration::from_secs(5));
        let first = ctx.deadline().unwrap();

        let narrowed = ctx.clone().with_timeout(Duration::from_secs(1));
        assert!(narrowed.deadline().unwrap() < first);

        let widened = ctx.with_timeout(Duration::from_secs(600));
        assert_eq!(widened.deadline(), Some(first));
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let ctx = ExecContext::new()
            .with_process_filter("")
            .with_process_command("");
        assert!(ctx.process_filter().is_none());
        assert!(ctx.process_command().is_none());
    }
}
