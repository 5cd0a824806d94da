//! drivegate server library
//!
//! FTP control and data channels on top of `drivegate-kernel`.

pub mod command;
pub mod config;
mod connection;
pub mod constants;
pub mod reply;
pub mod server;

pub use command::{Command, ParseError, Verb};
pub use config::{ConfigError, ServerConfig};
pub use reply::Reply;
pub use server::{ConnectionLimits, FtpServer};
