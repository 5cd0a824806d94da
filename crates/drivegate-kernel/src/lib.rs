//! # drivegate-kernel
//!
//! Virtual drive namespace and access control for the drivegate file server.
//!
//! Clients see one tree rooted at `/` whose first level is the set of
//! drives mounted right now (`/C`, `/D`, ...). Underneath, every operation
//! is translated to a drive-qualified native path and checked against the
//! user's permissions and home directory before it touches the disk.
//!
//! - [`namespace`] - Virtual ↔ native translation and filesystem primitives
//! - [`access`] - Authentication, permission checks, drive shortcuts
//! - [`users`] - User store (SQLite or in-memory)
//! - [`session`] - Per-connection login and working-directory state
//! - [`listing`] - LIST line formatting

pub mod access;
pub mod config;
pub mod error;
pub mod listing;
pub mod namespace;
pub mod session;
pub mod users;

pub use access::{
    AccessController, AccessPolicy, HomeDir, Identity, Permission, PermissionPreset,
    PermissionSet,
};
pub use config::{DriveConfig, SeedUser, TraceConfig};
pub use error::{GateError, GateResult};
pub use namespace::{
    DirEntry, DriveLetter, DriveSource, DriveTable, FileAttr, FileType, NamespaceProvider,
    NamespaceTranslator, NativePath, Target, VirtualPath,
};
pub use session::{SessionError, SessionHandler, SessionResult, SessionState, TransferTarget};
pub use users::{
    MemoryUserStore, SqliteUserStore, StoreError, StoreResult, UserInfo, UserRecord, UserStore,
    UserUpdate,
};
