use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the IPC socket path
pub const SOCKET_PATH_ENV: &str = "SERVER_SOCKET_PATH";

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Unix socket (named pipe on Windows) the host mounts the RPC surface on
    pub socket_path: PathBuf,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` keeps everything in memory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-subscriber event buffer, clamped to at least 100
    pub subscriber_buffer: usize,
    /// Payloads per streamed batch
    pub max_batch_size: usize,
    /// Upper bound on how long a partial batch waits
    pub flush_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            max_batch_size: 100,
            flush_interval_ms: 50,
        }
    }
}

impl SyncConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[cfg(windows)]
fn default_socket_path() -> PathBuf {
    PathBuf::from(r"\\.\pipe\the-dev-tools_server.socket")
}

#[cfg(not(windows))]
fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("the-dev-tools").join("server.socket")
}

impl ServerConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a YAML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;

        let mut config: ServerConfig = serde_yaml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e)
        })?;

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(path) = std::env::var_os(SOCKET_PATH_ENV) {
            if !path.is_empty() {
                self.socket_path = PathBuf::from(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.sync.subscriber_buffer, 256);
        assert_eq!(config.sync.max_batch_size, 100);
        assert_eq!(config.sync.flush_interval(), Duration::from_millis(50));
        assert!(config.database.path.is_none());
        #[cfg(not(windows))]
        assert!(config.socket_path.ends_with("the-dev-tools/server.socket"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  path: /tmp/devtools.db\nsync:\n  max_batch_size: 10\n"
        )
        .unwrap();

        let config = ServerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/devtools.db")));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.sync.max_batch_size, 10);
        assert_eq!(config.sync.flush_interval_ms, 50);
    }

    #[test]
    fn test_bad_yaml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sync: [not, a, map]").unwrap();
        let err = ServerConfig::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }
}
