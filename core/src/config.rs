//! Channel configuration.
//!
//! One [`ChannelConfig`] is built at process start and shared by every channel
//! through an `Arc`. It can also be persisted as JSON, e.g.:
//!
//! ```json
//! { "programPath": "/opt/chaosblade", "execTimeoutSecs": 30 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Paths and constants the channels need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Installation directory of the tool.
    #[serde(default = "default_program_path")]
    pub program_path: PathBuf,

    /// Sub directory holding helper binaries.
    #[serde(default = "default_bin_dir_name")]
    pub bin_dir_name: String,

    /// Sub directory holding libraries.
    #[serde(default = "default_lib_dir_name")]
    pub lib_dir_name: String,

    /// File name of the namespace-entry helper.
    #[serde(default = "default_nsexec_bin")]
    pub nsexec_bin: String,

    /// os-release file probed for the Alpine dialect.
    #[serde(default = "default_os_release_path")]
    pub os_release_path: PathBuf,

    /// Ceiling for a single command execution, in seconds.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,

    /// Helper process names never returned by pid lookups.
    #[serde(default = "default_self_markers")]
    pub self_markers: Vec<String>,

    /// Command name of the tool itself.
    #[serde(default = "default_self_command")]
    pub self_command: String,

    /// Path fragment identifying binaries shipped with the tool.
    #[serde(default = "default_install_marker")]
    pub install_marker: String,
}

fn default_program_path() -> PathBuf {
    program_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_bin_dir_name() -> String {
    "bin".to_string()
}

fn default_lib_dir_name() -> String {
    "lib".to_string()
}

fn default_nsexec_bin() -> String {
    "nsexec".to_string()
}

fn default_os_release_path() -> PathBuf {
    PathBuf::from("/etc/os-release")
}

fn default_exec_timeout_secs() -> u64 {
    60
}

fn default_self_markers() -> Vec<String> {
    vec![
        "chaos_killprocess".to_string(),
        "chaos_stopprocess".to_string(),
    ]
}

fn default_self_command() -> String {
    "blade".to_string()
}

fn default_install_marker() -> String {
    "/chaosblade".to_string()
}

/// Directory of the running executable, with symlinks resolved.
fn program_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Config(format!("{} has no parent directory", exe.display())))
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::with_program_path(default_program_path())
    }
}

impl ChannelConfig {
    /// Config rooted at the directory of the running executable.
    pub fn from_current_exe() -> Result<Self> {
        Ok(Self::with_program_path(program_dir()?))
    }

    /// Config rooted at `program_path`, everything else defaulted.
    pub fn with_program_path(program_path: impl Into<PathBuf>) -> Self {
        Self {
            program_path: program_path.into(),
            bin_dir_name: default_bin_dir_name(),
            lib_dir_name: default_lib_dir_name(),
            nsexec_bin: default_nsexec_bin(),
            os_release_path: default_os_release_path(),
            exec_timeout_secs: default_exec_timeout_secs(),
            self_markers: default_self_markers(),
            self_command: default_self_command(),
            install_marker: default_install_marker(),
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// Returns the default config if the file doesn't exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration as JSON, replacing the file atomically.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.program_path.join(&self.bin_dir_name)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.program_path.join(&self.lib_dir_name)
    }

    /// Location of the namespace-entry helper.
    ///
    /// `bin` is appended unless the program path already ends with it.
    pub fn nsexec_path(&self) -> PathBuf {
        let in_bin = self
            .program_path
            .file_name()
            .is_some_and(|name| name == self.bin_dir_name.as_str());
        let dir = if in_bin {
            self.program_path.clone()
        } else {
            self.bin_dir()
        };
        dir.join(&self.nsexec_bin)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    fn self_command_path(&self) -> PathBuf {
        self.program_path.join(&self.self_command)
    }

    /// Whether `script` invokes the tool itself.
    pub fn is_self_command(&self, script: &str) -> bool {
        script == self.self_command || Path::new(script) == self.self_command_path()
    }

    /// Whether `script` points at a binary shipped with the tool.
    pub fn looks_like_installed_binary(&self, script: &str) -> bool {
        script.contains(self.install_marker.as_str())
            || Path::new(script) == self.self_command_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nsexec_path_appends_bin() {
        let config = ChannelConfig::with_program_path("/opt/chaosblade");
        assert_eq!(
            config.nsexec_path(),
            PathBuf::from("/opt/chaosblade/bin/nsexec")
        );
    }

    #[test]
    fn test_nsexec_path_inside_bin() {
        let config = ChannelConfig::with_program_path("/opt/chaosblade/bin");
        assert_eq!(
            config.nsexec_path(),
            PathBuf::from("/opt/chaosblade/bin/nsexec")
        );
    }

    #[test]
    fn test_derived_dirs() {
        let config = ChannelConfig::with_program_path("/opt/tool");
        assert_eq!(config.bin_dir(), PathBuf::from("/opt/tool/bin"));
        assert_eq!(config.lib_dir(), PathBuf::from("/opt/tool/lib"));
        assert_eq!(config.exec_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_self_command_detection() {
        let config = ChannelConfig::with_program_path("/opt/chaosblade");
        assert!(config.is_self_command("blade"));
        assert!(config.is_self_command("/opt/chaosblade/blade"));
        assert!(!config.is_self_command("/usr/bin/blade-runner"));

        assert!(config.looks_like_installed_binary("/opt/chaosblade/bin/chaos_os"));
        assert!(config.looks_like_installed_binary("/opt/chaosblade/blade"));
        assert!(!config.looks_like_installed_binary("ss"));
    }

    #[test]
    fn test_from_current_exe() {
        let config = ChannelConfig::from_current_exe().unwrap();
        assert!(config.program_path.is_dir());
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = ChannelConfig::load(&dir.path().join("missing.json"))
            .await
            .unwrap();
        assert_eq!(config.nsexec_bin, "nsexec");
        assert_eq!(config.exec_timeout_secs, 60);
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channel.json");
        std::fs::write(
            &path,
            r#"{"programPath": "/opt/tool", "execTimeoutSecs": 5}"#,
        )
        .unwrap();

        let config = ChannelConfig::load(&path).await.unwrap();
        assert_eq!(config.program_path, PathBuf::from("/opt/tool"));
        assert_eq!(config.exec_timeout(), Duration::from_secs(5));
        assert_eq!(config.self_markers.len(), 2);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("channel.json");
        let mut config = ChannelConfig::with_program_path("/opt/tool");
        config.self_markers.push("chaos_extra".to_string());

        config.save(&path).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ChannelConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channel.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ChannelConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
