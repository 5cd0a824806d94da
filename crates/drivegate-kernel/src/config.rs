//! Kernel configuration objects.
//!
//! These are handed explicitly to the translator and the access controller;
//! the server deserializes them as part of its RON config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::namespace::DriveLetter;

/// Which trace events are emitted.
///
/// Both are off by default so the resolution and permission hot paths stay
/// quiet unless someone is debugging them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Emit a `drivegate::resolve` event for every path resolution.
    pub resolve: bool,
    /// Emit a `drivegate::access` event for every permission check.
    pub permissions: bool,
}

impl TraceConfig {
    /// Everything on.
    pub fn all() -> Self {
        Self {
            resolve: true,
            permissions: true,
        }
    }
}

/// How drive letters map onto host storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveConfig {
    /// Use the host's own drives (`A:\` .. `Z:\` on Windows, `/` as `C` elsewhere).
    #[default]
    System,
    /// Explicit letter → host directory table.
    Mapped(BTreeMap<DriveLetter, PathBuf>),
}

/// An account created at startup if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    /// Permission string, e.g. `"elr"`.
    pub permissions: String,
    /// `/` or a native path such as `D:\data`.
    pub home: String,
}
