//! Direct process listing through `sysinfo`.
//!
//! Used by [`LocalChannel`](super::LocalChannel) when the host is supported;
//! everything else falls back to `ps`/`pgrep` pipelines.

use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind, Users};
use tracing::debug;

use crate::domain::ProcessSnapshot;
use crate::error::{Error, Result};

/// How a channel enumerates processes for pid-by-name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessLookup {
    /// Read the process table in-process and filter in memory.
    Direct,
    /// Run `ps`/`pgrep` pipelines through the channel.
    Pipeline,
}

impl ProcessLookup {
    /// `Direct` wherever `sysinfo` can read the process table.
    pub fn detect() -> Self {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            ProcessLookup::Direct
        } else {
            ProcessLookup::Pipeline
        }
    }
}

/// Name and full command line of every live process.
pub async fn snapshot() -> Result<Vec<ProcessSnapshot>> {
    let processes = tokio::task::spawn_blocking(|| {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .iter()
            .map(|(pid, process)| {
                ProcessSnapshot::new(pid.as_u32(), process.name(), process.cmd().join(" "))
            })
            .collect::<Vec<_>>()
    })
    .await?;

    debug!(count = processes.len(), "Took process snapshot");
    Ok(processes)
}

/// Parse a textual pid.
pub fn parse_pid(pid: &str) -> Result<u32> {
    pid.trim().parse().map_err(|source| Error::InvalidPid {
        pid: pid.to_string(),
        source,
    })
}

/// Whether a process with `pid` is alive.
///
/// Pid 0 never counts as a live process.
pub fn process_exists(pid: &str) -> Result<bool> {
    let pid = parse_pid(pid)?;
    if pid == 0 {
        return Ok(false);
    }
    probe_alive(pid)
}

#[cfg(unix)]
fn probe_alive(pid: u32) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    // Pids beyond i32 would be read as process groups by kill(2).
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(NixPid::from_raw(raw), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(Error::Io(std::io::Error::from(e))),
    }
}

#[cfg(not(unix))]
fn probe_alive(pid: u32) -> Result<bool> {
    let mut system = System::new();
    Ok(system.refresh_process(Pid::from_u32(pid)))
}

/// Name of the user owning `pid`.
pub fn pid_user(pid: &str) -> Result<String> {
    let pid = parse_pid(pid)?;
    let sys_pid = Pid::from_u32(pid);

    let mut system = System::new();
    let refresh = ProcessRefreshKind::new().with_user(UpdateKind::Always);
    if !system.refresh_process_specifics(sys_pid, refresh) {
        return Err(Error::ProcessNotFound(pid));
    }
    let uid = system
        .process(sys_pid)
        .and_then(|process| process.user_id())
        .ok_or_else(|| Error::CommandFailed(format!("no owner recorded for process {}", pid)))?;

    let users = Users::new_with_refreshed_list();
    users
        .get_user_by_id(uid)
        .map(|user| user.name().to_string())
        .ok_or_else(|| Error::CommandFailed(format!("unknown user id for process {}", pid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid(" 42 ").unwrap(), 42);
        assert!(matches!(parse_pid("abc"), Err(Error::InvalidPid { .. })));
        assert!(matches!(parse_pid("-1"), Err(Error::InvalidPid { .. })));
    }

    #[test]
    fn test_own_process_exists() {
        let own = std::process::id().to_string();
        assert!(process_exists(&own).unwrap());
    }

    #[test]
    fn test_pid_zero_does_not_exist() {
        assert!(!process_exists("0").unwrap());
    }

    #[test]
    fn test_process_exists_rejects_garbage() {
        assert!(process_exists("12ab").is_err());
    }

    #[test]
    fn test_unused_pid_does_not_exist() {
        assert!(!process_exists(&u32::MAX.to_string()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_pid_user_of_own_process() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        // Containers may run under a uid without a passwd entry.
        match pid_user(&std::process::id().to_string()) {
            Ok(user) => assert!(!user.is_empty()),
            Err(e) => assert!(matches!(e, Error::CommandFailed(_)), "{e}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_contains_own_process() {
        if ProcessLookup::detect() != ProcessLookup::Direct {
            return;
        }
        let own = std::process::id();
        let processes = snapshot().await.unwrap();
        assert!(processes.iter().any(|p| p.pid == own));
    }
}
