//! Directory entry and attribute types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub(crate) fn from_std(ft: std::fs::FileType) -> Self {
        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }
}

/// Native attributes of an entry, as far as a listing needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Write-protected on the host.
    pub readonly: bool,
}

impl FileAttr {
    /// Attributes for a place that exists only in the namespace (root, drives).
    pub fn synthetic_directory() -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            mtime: SystemTime::UNIX_EPOCH,
            readonly: false,
        }
    }

    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            size: meta.len(),
            kind: FileType::from_std(meta.file_type()),
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            readonly: meta.permissions().readonly(),
        }
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }
}

/// Directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
    /// Native attributes; `None` for synthesized entries.
    pub attr: Option<FileAttr>,
}

impl DirEntry {
    /// A directory that exists only in the namespace.
    pub fn synthetic_directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileType::Directory,
            attr: None,
        }
    }

    /// Returns true if this entry was synthesized rather than read from disk.
    pub fn is_synthetic(&self) -> bool {
        self.attr.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
    }

    #[test]
    fn test_synthetic_entries() {
        let entry = DirEntry::synthetic_directory("C");
        assert!(entry.kind.is_dir());
        assert!(entry.is_synthetic());
        assert!(FileAttr::synthetic_directory().is_dir());
    }
}
