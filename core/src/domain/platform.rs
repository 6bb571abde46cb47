//! Host platform facts used to pick command dialects.

use serde::{Deserialize, Serialize};

/// `ps` arguments for full-featured `ps` (procps).
pub const PS_ARGS_STANDARD: &str = "-eo user,pid,ppid,args";

/// `ps` arguments for busybox `ps`, which has no `-e`.
pub const PS_ARGS_BUSYBOX: &str = "-o user,pid,ppid,args";

/// awk program printing the `ID` field of an os-release file.
pub const OS_RELEASE_ID_AWK: &str = r#"-F '=' '{if ($1 == "ID") {print $2;exit 0}}'"#;

/// Operating system family of the execution host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
    Other,
}

impl OsFamily {
    /// Family of the host this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            OsFamily::Linux
        } else if cfg!(target_os = "macos") {
            OsFamily::Darwin
        } else if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else {
            OsFamily::Other
        }
    }
}

/// Lazily probed dialect facts for one host or namespace target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProfile {
    pub os: OsFamily,
    /// Busybox/Alpine userland with the reduced `ps`.
    pub alpine: bool,
}

impl PlatformProfile {
    pub fn new(os: OsFamily, alpine: bool) -> Self {
        Self { os, alpine }
    }

    /// Profile for a host whose os-release could not be read.
    pub fn standard(os: OsFamily) -> Self {
        Self::new(os, false)
    }

    /// Build a profile from the `ID` value printed by [`OS_RELEASE_ID_AWK`].
    pub fn from_os_release_id(os: OsFamily, id: &str) -> Self {
        Self::new(os, id.trim() == "alpine")
    }

    pub fn ps_args(&self) -> &'static str {
        if self.alpine {
            PS_ARGS_BUSYBOX
        } else {
            PS_ARGS_STANDARD
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpine_id_selects_busybox_args() {
        let profile = PlatformProfile::from_os_release_id(OsFamily::Linux, "alpine\n");
        assert!(profile.alpine);
        assert_eq!(profile.ps_args(), "-o user,pid,ppid,args");
    }

    #[test]
    fn test_other_ids_use_standard_args() {
        for id in ["centos", "\"ubuntu\"", "", "alpine-like"] {
            let profile = PlatformProfile::from_os_release_id(OsFamily::Linux, id);
            assert!(!profile.alpine, "{id} must not be alpine");
            assert_eq!(profile.ps_args(), "-eo user,pid,ppid,args");
        }
    }

    #[test]
    fn test_standard_profile() {
        let profile = PlatformProfile::standard(OsFamily::current());
        assert!(!profile.alpine);
    }
}
