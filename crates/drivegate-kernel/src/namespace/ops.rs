//! Namespace operations trait.
//!
//! This is the seam the protocol engine talks to: every operation takes a
//! virtual path plus the caller's current working directory and answers in
//! terms of the synthetic drive tree.

use async_trait::async_trait;
use std::path::PathBuf;

use super::path::{DriveLetter, Target, VirtualPath};
use super::types::{DirEntry, FileAttr};
use crate::error::GateResult;

/// Core namespace operations.
///
/// Implementations hold no per-session state; the cwd is always passed in,
/// so one instance can serve every connection concurrently.
#[async_trait]
pub trait NamespaceProvider: Send + Sync {
    // ========================================================================
    // Translation
    // ========================================================================

    /// Resolve a virtual path (absolute or relative to `cwd`).
    fn virtual_to_native(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<Target>;

    /// Name a resolved target in the virtual tree.
    fn native_to_virtual(&self, target: &Target) -> VirtualPath {
        target.to_virtual()
    }

    /// Host path backing a native target, for the transfer layer.
    fn host_path(&self, target: &Target) -> GateResult<PathBuf>;

    /// Drives mounted right now.
    fn mounted_drives(&self) -> Vec<DriveLetter>;

    // ========================================================================
    // Queries
    // ========================================================================

    /// List a directory. The root lists the mounted drives.
    async fn listdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<Vec<DirEntry>>;

    /// Validate a navigation target and return the new cwd.
    async fn chdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<VirtualPath>;

    /// Attributes of a target. Root and drives report a synthetic directory.
    async fn stat(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<FileAttr>;

    /// True for the root, every mounted drive, and native directories.
    async fn is_dir(&self, vpath: &str, cwd: &VirtualPath) -> bool;

    /// True only for native regular files.
    async fn is_file(&self, vpath: &str, cwd: &VirtualPath) -> bool;

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a directory (and missing ancestors). Idempotent for directories.
    async fn mkdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()>;

    /// Remove a file.
    async fn remove(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &str, to: &str, cwd: &VirtualPath) -> GateResult<()>;
}
