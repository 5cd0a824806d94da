//! Authenticated identities and home directories.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::permission::{Permission, PermissionSet};
use crate::namespace::{DriveLetter, NativePath, Target, VirtualPath};

/// Name of the built-in anonymous identity.
pub const ANONYMOUS: &str = "anonymous";

/// The subtree an identity is confined to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HomeDir {
    /// `/`: every drive.
    Unrestricted,
    /// `X:\`: one whole drive.
    Drive(DriveLetter),
    /// `X:\some\dir`: one directory and everything beneath it.
    Directory(NativePath),
}

impl HomeDir {
    /// Parse the stored form: `/`, `X:`, `X:\` or a deeper native path.
    pub fn parse(s: &str) -> Option<Self> {
        match Target::parse(s.trim())? {
            Target::Root => Some(HomeDir::Unrestricted),
            Target::Native(path) if path.is_drive_root() => Some(HomeDir::Drive(path.drive())),
            Target::Native(path) => Some(HomeDir::Directory(path)),
        }
    }

    pub fn to_target(&self) -> Target {
        match self {
            HomeDir::Unrestricted => Target::Root,
            HomeDir::Drive(d) => Target::Native(d.native_root()),
            HomeDir::Directory(path) => Target::Native(path.clone()),
        }
    }

    /// Where a session starts after logging in.
    pub fn to_virtual(&self) -> VirtualPath {
        self.to_target().to_virtual()
    }

    /// The drive a confined home lives on.
    pub fn drive(&self) -> Option<DriveLetter> {
        match self {
            HomeDir::Unrestricted => None,
            HomeDir::Drive(d) => Some(*d),
            HomeDir::Directory(path) => Some(path.drive()),
        }
    }
}

impl fmt::Display for HomeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_target().fmt(f)
    }
}

impl TryFrom<String> for HomeDir {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not a home directory: {s:?}"))
    }
}

impl From<HomeDir> for String {
    fn from(home: HomeDir) -> Self {
        home.to_string()
    }
}

/// Who a session is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub permissions: PermissionSet,
    pub home: HomeDir,
}

impl Identity {
    /// The built-in anonymous identity: `elr` everywhere, never stored.
    pub fn anonymous() -> Self {
        Self {
            username: ANONYMOUS.to_string(),
            permissions: [Permission::Enter, Permission::List, Permission::Read]
                .into_iter()
                .collect(),
            home: HomeDir::Unrestricted,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS
    }
}
