//! Server configuration constants.
//!
//! Defaults for every [`ServerConfig`](crate::config::ServerConfig) field.

use std::time::Duration;

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 2121;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Greeting sent with the 220 reply.
pub const DEFAULT_BANNER: &str = "drivegate ready.";

/// Idle time before a control connection is closed with 421.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Simultaneous control connections, all clients.
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// Simultaneous control connections from one address.
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: usize = 5;

/// How long a passive listener waits for the client to connect.
pub const DATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest accepted command line, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Config file name under the config directory.
pub const CONFIG_FILE_NAME: &str = "drivegate.ron";

/// User database file name under the data directory.
pub const USER_DB_FILE_NAME: &str = "users.db";
