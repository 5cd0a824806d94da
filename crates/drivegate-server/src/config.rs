//! Server configuration (RON).
//!
//! ```ron
//! (
//!     listen: "0.0.0.0:2121",
//!     idle_timeout_secs: 300,
//!     passive_ports: Some((50000, 50100)),
//!     user_db: Some("~/.local/share/drivegate/users.db"),
//!     drives: Mapped({ 'C': "/srv/c", 'D': "/srv/d" }),
//!     trace: (resolve: true),
//! )
//! ```
//!
//! Every field is optional; a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use drivegate_kernel::{DriveConfig, SeedUser, TraceConfig};

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_BANNER, DEFAULT_BIND_ADDRESS, DEFAULT_FTP_PORT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTIONS_PER_IP,
    USER_DB_FILE_NAME,
};

/// Error loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error in {}: {source}", path.display())]
    Ron {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid listen address {0:?}")]
    Listen(String),
}

/// Everything the server reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Control-channel address, `host:port`.
    pub listen: String,
    pub banner: String,
    pub idle_timeout_secs: u64,
    pub max_connections: usize,
    pub max_connections_per_ip: usize,
    /// Inclusive passive port range; `None` lets the OS pick.
    pub passive_ports: Option<(u16, u16)>,
    /// User database path. `~` is expanded.
    pub user_db: Option<String>,
    pub drives: DriveConfig,
    pub trace: TraceConfig,
    /// Accounts created at startup when missing.
    pub seed_users: Vec<SeedUser>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: format!("{DEFAULT_BIND_ADDRESS}:{DEFAULT_FTP_PORT}"),
            banner: DEFAULT_BANNER.to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_connections_per_ip: DEFAULT_MAX_CONNECTIONS_PER_IP,
            passive_ports: None,
            user_db: None,
            drives: DriveConfig::default(),
            trace: TraceConfig::default(),
            seed_users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `~/.config/drivegate/drivegate.ron` (platform equivalent).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drivegate")
            .join(CONFIG_FILE_NAME)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_ron(&text).map_err(|source| ConfigError::Ron {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::Listen(self.listen.clone()))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The user database location with `~` expanded.
    pub fn user_db_path(&self) -> PathBuf {
        match &self.user_db {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("drivegate")
                .join(USER_DB_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivegate_kernel::DriveLetter;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = ServerConfig::from_ron("()").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr().unwrap().port(), DEFAULT_FTP_PORT);
        assert_eq!(config.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn full_document() {
        let text = r#"(
            listen: "127.0.0.1:2200",
            banner: "hi",
            idle_timeout_secs: 10,
            passive_ports: Some((50000, 50010)),
            user_db: Some("~/users.db"),
            drives: Mapped({ 'c': "/srv/c", 'D': "/srv/d" }),
            trace: (resolve: true),
            seed_users: [
                (username: "admin", password: "admin", permissions: "elradfmwMT", home: "/"),
            ],
        )"#;
        let config = ServerConfig::from_ron(text).unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 2200);
        assert_eq!(config.passive_ports, Some((50000, 50010)));
        assert!(config.trace.resolve);
        assert!(!config.trace.permissions);
        assert_eq!(config.seed_users.len(), 1);

        let DriveConfig::Mapped(map) = &config.drives else {
            panic!("expected mapped drives");
        };
        assert!(map.contains_key(&DriveLetter::new('C').unwrap()));
        assert!(!config.user_db_path().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig::load(&dir.path().join("nope.ron")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn bad_file_reports_the_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "(listen: 5").unwrap();
        let err = ServerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("bad.ron"));
    }
}
