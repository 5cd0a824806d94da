//! Authentication and per-user, path-scoped access control.
//!
//! Permission checks are evaluated against native targets only: a user's
//! home is a native path (or `/`) and containment is decided segment-wise
//! on the native side.

mod controller;
mod identity;
mod permission;

pub use controller::{ALIAS_PREFIX, AccessController, AccessPolicy};
pub use identity::{ANONYMOUS, HomeDir, Identity};
pub use permission::{Permission, PermissionPreset, PermissionSet, parse_permissions};
