//! Virtual ↔ native translation over live drives.
//!
//! The virtual tree looks like this:
//!
//! ```text
//! /            every mounted drive, synthesized
//! /C           C:\
//! /C/Users/x   C:\Users\x
//! ```
//!
//! Nothing here is cached: each call asks the [`DriveSource`] which drives
//! exist and stats the host filesystem directly.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

use super::drives::DriveSource;
use super::ops::NamespaceProvider;
use super::path::{split_drive_spec, DriveLetter, NativePath, Target, VirtualPath};
use super::types::{DirEntry, FileAttr, FileType};
use crate::config::TraceConfig;
use crate::error::{GateError, GateResult};

/// Maps the synthetic drive tree onto host storage.
#[derive(Clone)]
pub struct NamespaceTranslator {
    drives: Arc<dyn DriveSource>,
    trace: TraceConfig,
}

impl std::fmt::Debug for NamespaceTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceTranslator")
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl NamespaceTranslator {
    pub fn new(drives: Arc<dyn DriveSource>, trace: TraceConfig) -> Self {
        Self { drives, trace }
    }

    /// The drive source this translator consults.
    pub fn drives(&self) -> &Arc<dyn DriveSource> {
        &self.drives
    }

    fn resolve(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<Target> {
        // Native drive spec given directly (C:, C:\Users)
        if let Some((drive, rest)) = split_drive_spec(vpath) {
            return self.checked(Target::Native(drive.native_root().join(rest)));
        }

        if vpath.starts_with('/') {
            return self.checked(VirtualPath::new(vpath)?.to_target());
        }

        if vpath.is_empty() || vpath == "." {
            return self.checked(cwd.to_target());
        }

        if vpath.trim_end_matches('/') == ".." {
            // At the root, or on a bare drive, `..` lands on the root.
            if cwd.is_root() || cwd.is_drive() {
                return Ok(Target::Root);
            }
            let Target::Native(current) = self.checked(cwd.to_target())? else {
                return Ok(Target::Root);
            };
            return self.checked(Target::Native(current.parent()));
        }

        match cwd.to_target() {
            // Relative to the root, the first segment names a drive.
            Target::Root => self.checked(VirtualPath::new(&format!("/{vpath}"))?.to_target()),
            Target::Native(current) => self.checked(Target::Native(current.join(vpath))),
        }
    }

    /// Fail with NotFound unless the target's drive is mounted right now.
    fn checked(&self, target: Target) -> GateResult<Target> {
        if let Target::Native(path) = &target {
            if !self.drives.is_mounted(path.drive()) {
                return Err(GateError::not_found(path.drive().native_root().to_string()));
            }
        }
        Ok(target)
    }

    fn host(&self, path: &NativePath) -> GateResult<PathBuf> {
        let root = self
            .drives
            .host_root(path.drive())
            .ok_or_else(|| GateError::not_found(path.drive().native_root().to_string()))?;
        Ok(path.host_path(&root))
    }

    /// Stat a native path; NotFound is an answer, not an error.
    async fn probe(&self, path: &NativePath) -> GateResult<Option<(PathBuf, std::fs::Metadata)>> {
        let host = self.host(path)?;
        match fs::metadata(&host).await {
            Ok(meta) => Ok(Some((host, meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GateError::from_io(e, path.to_string())),
        }
    }

    /// List a resolved target.
    pub async fn list_target(&self, target: &Target) -> GateResult<Vec<DirEntry>> {
        let Target::Native(path) = target else {
            return Ok(self
                .drives
                .mounted()
                .into_iter()
                .map(|d| DirEntry::synthetic_directory(d.to_string()))
                .collect());
        };

        let Some((host, meta)) = self.probe(path).await? else {
            return Err(GateError::not_found(path.to_string()));
        };
        if !meta.is_dir() {
            return Err(GateError::not_a_directory(path.to_string()));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&host)
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))?
        {
            let kind = match entry.file_type().await {
                Ok(ft) => FileType::from_std(ft),
                Err(_) => FileType::File,
            };
            // Follow symlinks for the attributes the listing shows.
            let attr = match fs::metadata(entry.path()).await {
                Ok(meta) => FileAttr::from_metadata(&meta),
                Err(_) => match entry.metadata().await {
                    Ok(meta) => FileAttr::from_metadata(&meta),
                    Err(_) => FileAttr {
                        size: 0,
                        kind,
                        mtime: std::time::SystemTime::UNIX_EPOCH,
                        readonly: false,
                    },
                },
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                attr: Some(attr),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Validate a resolved target as a navigation destination.
    pub async fn enter_target(&self, target: &Target) -> GateResult<VirtualPath> {
        let Target::Native(path) = target else {
            return Ok(VirtualPath::root());
        };
        if path.is_drive_root() {
            self.checked(target.clone())?;
            return Ok(VirtualPath::drive(path.drive()));
        }
        match self.probe(path).await? {
            None => Err(GateError::not_found(path.to_string())),
            Some((_, meta)) if !meta.is_dir() => Err(GateError::not_a_directory(path.to_string())),
            Some(_) => Ok(target.to_virtual()),
        }
    }

    fn trace_resolution(&self, vpath: &str, cwd: &VirtualPath, result: &GateResult<Target>) {
        if !self.trace.resolve {
            return;
        }
        match result {
            Ok(target) => tracing::debug!(
                target: "drivegate::resolve",
                vpath,
                cwd = %cwd,
                resolved = %target,
                "path resolved"
            ),
            Err(e) => tracing::debug!(
                target: "drivegate::resolve",
                vpath,
                cwd = %cwd,
                error = %e,
                "path not resolved"
            ),
        }
    }
}

#[async_trait]
impl NamespaceProvider for NamespaceTranslator {
    fn virtual_to_native(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<Target> {
        let result = self.resolve(vpath, cwd);
        self.trace_resolution(vpath, cwd, &result);
        result
    }

    fn host_path(&self, target: &Target) -> GateResult<PathBuf> {
        match target {
            Target::Root => Err(GateError::invalid_path("/ has no host path")),
            Target::Native(path) => self.host(path),
        }
    }

    fn mounted_drives(&self) -> Vec<DriveLetter> {
        self.drives.mounted()
    }

    async fn listdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<Vec<DirEntry>> {
        let target = self.virtual_to_native(vpath, cwd)?;
        self.list_target(&target).await
    }

    async fn chdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<VirtualPath> {
        let target = self.virtual_to_native(vpath, cwd)?;
        self.enter_target(&target).await
    }

    async fn stat(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<FileAttr> {
        let Target::Native(path) = self.virtual_to_native(vpath, cwd)? else {
            return Ok(FileAttr::synthetic_directory());
        };
        if path.is_drive_root() {
            return Ok(FileAttr::synthetic_directory());
        }
        match self.probe(&path).await? {
            Some((_, meta)) => Ok(FileAttr::from_metadata(&meta)),
            None => Err(GateError::not_found(path.to_string())),
        }
    }

    async fn is_dir(&self, vpath: &str, cwd: &VirtualPath) -> bool {
        match self.virtual_to_native(vpath, cwd) {
            Ok(Target::Root) => true,
            Ok(Target::Native(path)) if path.is_drive_root() => true,
            Ok(Target::Native(path)) => matches!(
                self.probe(&path).await,
                Ok(Some((_, meta))) if meta.is_dir()
            ),
            Err(_) => false,
        }
    }

    async fn is_file(&self, vpath: &str, cwd: &VirtualPath) -> bool {
        match self.virtual_to_native(vpath, cwd) {
            Ok(Target::Native(path)) if !path.is_drive_root() => matches!(
                self.probe(&path).await,
                Ok(Some((_, meta))) if meta.is_file()
            ),
            _ => false,
        }
    }

    async fn mkdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()> {
        let Target::Native(path) = self.virtual_to_native(vpath, cwd)? else {
            // The root always exists as a directory.
            return Ok(());
        };
        let host = match self.probe(&path).await? {
            Some((_, meta)) if meta.is_dir() => return Ok(()),
            Some(_) => return Err(GateError::conflict(path.to_string())),
            None => self.host(&path)?,
        };
        fs::create_dir_all(&host)
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))
    }

    async fn rmdir(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()> {
        let target = self.virtual_to_native(vpath, cwd)?;
        let path = match &target {
            Target::Native(path) if !path.is_drive_root() => path,
            _ => return Err(GateError::permission_denied(format!("{target} is a drive"))),
        };

        let Some((host, meta)) = self.probe(path).await? else {
            return Err(GateError::not_found(path.to_string()));
        };
        if !meta.is_dir() {
            return Err(GateError::not_a_directory(path.to_string()));
        }

        let mut dir = fs::read_dir(&host)
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))?;
        if dir
            .next_entry()
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))?
            .is_some()
        {
            return Err(GateError::not_empty(path.to_string()));
        }

        fs::remove_dir(&host)
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))
    }

    async fn remove(&self, vpath: &str, cwd: &VirtualPath) -> GateResult<()> {
        let target = self.virtual_to_native(vpath, cwd)?;
        let path = match &target {
            Target::Native(path) if !path.is_drive_root() => path,
            _ => return Err(GateError::is_a_directory(target.to_string())),
        };

        let Some((host, meta)) = self.probe(path).await? else {
            return Err(GateError::not_found(path.to_string()));
        };
        if meta.is_dir() {
            return Err(GateError::is_a_directory(path.to_string()));
        }

        fs::remove_file(&host)
            .await
            .map_err(|e| GateError::from_io(e, path.to_string()))
    }

    async fn rename(&self, from: &str, to: &str, cwd: &VirtualPath) -> GateResult<()> {
        let from = self.virtual_to_native(from, cwd)?;
        let to = self.virtual_to_native(to, cwd)?;
        let (Target::Native(from), Target::Native(to)) = (&from, &to) else {
            return Err(GateError::permission_denied("cannot rename the root"));
        };
        if from.is_drive_root() || to.is_drive_root() {
            return Err(GateError::permission_denied("cannot rename a drive"));
        }

        let Some((from_host, _)) = self.probe(from).await? else {
            return Err(GateError::not_found(from.to_string()));
        };
        let to_host = self.host(to)?;

        fs::rename(&from_host, &to_host)
            .await
            .map_err(|e| GateError::from_io(e, to.to_string()))
    }
}
