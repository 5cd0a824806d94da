//! Live drive discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::path::DriveLetter;
use crate::config::DriveConfig;

/// Answers which drives are mounted and where their roots live.
///
/// Implementations must query the host on every call; callers rely on
/// mount state never being cached.
pub trait DriveSource: Send + Sync {
    /// Host directory backing `drive`, if the drive is mounted right now.
    fn host_root(&self, drive: DriveLetter) -> Option<PathBuf>;

    /// Currently mounted drives in ascending order.
    fn mounted(&self) -> Vec<DriveLetter> {
        DriveLetter::all()
            .filter(|d| self.host_root(*d).is_some())
            .collect()
    }

    /// True if `drive` is mounted right now.
    fn is_mounted(&self, drive: DriveLetter) -> bool {
        self.host_root(drive).is_some()
    }
}

/// Letter → host directory table.
///
/// A drive counts as mounted while its host directory exists; the check
/// runs on every lookup.
#[derive(Debug, Clone, Default)]
pub struct DriveTable {
    roots: BTreeMap<DriveLetter, PathBuf>,
}

impl DriveTable {
    /// The host's own drives.
    ///
    /// On Windows every letter maps to `X:\`. Elsewhere the filesystem root
    /// is exposed as drive `C`.
    pub fn system() -> Self {
        let roots = if cfg!(windows) {
            DriveLetter::all()
                .map(|d| (d, PathBuf::from(format!("{d}:\\"))))
                .collect()
        } else {
            DriveLetter::new('C')
                .map(|c| (c, PathBuf::from("/")))
                .into_iter()
                .collect()
        };
        Self { roots }
    }

    /// An explicit mapping.
    ///
    /// Roots are canonicalized once here (e.g. macOS `/tmp` → `/private/tmp`);
    /// a root that does not exist yet is kept as given.
    pub fn mapped(roots: impl IntoIterator<Item = (DriveLetter, PathBuf)>) -> Self {
        let roots = roots
            .into_iter()
            .map(|(d, root)| {
                let root = dunce::canonicalize(&root).unwrap_or(root);
                (d, root)
            })
            .collect();
        Self { roots }
    }

    pub fn from_config(config: &DriveConfig) -> Self {
        match config {
            DriveConfig::System => Self::system(),
            DriveConfig::Mapped(map) => Self::mapped(map.clone()),
        }
    }

    /// Configured roots, mounted or not.
    pub fn configured(&self) -> impl Iterator<Item = (DriveLetter, &Path)> {
        self.roots.iter().map(|(d, p)| (*d, p.as_path()))
    }
}

impl DriveSource for DriveTable {
    fn host_root(&self, drive: DriveLetter) -> Option<PathBuf> {
        self.roots.get(&drive).filter(|root| root.is_dir()).cloned()
    }

    fn mounted(&self) -> Vec<DriveLetter> {
        self.roots
            .iter()
            .filter(|(_, root)| root.is_dir())
            .map(|(d, _)| *d)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn letter(c: char) -> DriveLetter {
        DriveLetter::new(c).unwrap()
    }

    #[test]
    fn mounted_follows_the_host_live() {
        let c = TempDir::new().unwrap();
        let d = TempDir::new().unwrap();
        let d_path = d.path().to_path_buf();
        let table = DriveTable::mapped([
            (letter('C'), c.path().to_path_buf()),
            (letter('D'), d_path.clone()),
        ]);

        assert_eq!(table.mounted(), vec![letter('C'), letter('D')]);

        drop(d);
        assert!(!d_path.exists());
        assert_eq!(table.mounted(), vec![letter('C')]);
        assert!(table.host_root(letter('D')).is_none());
    }

    #[test]
    fn unconfigured_letters_are_not_mounted() {
        let c = TempDir::new().unwrap();
        let table = DriveTable::mapped([(letter('C'), c.path().to_path_buf())]);
        assert!(!table.is_mounted(letter('Z')));
    }

    #[test]
    fn config_round_trip_through_table() {
        let c = TempDir::new().unwrap();
        let mut map = BTreeMap::new();
        map.insert(letter('c'), c.path().to_path_buf());
        let table = DriveTable::from_config(&DriveConfig::Mapped(map));
        assert_eq!(table.configured().count(), 1);
        assert!(table.is_mounted(letter('C')));
    }
}
