//! The permission alphabet.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, EnumString, IntoEnumIterator};

/// One capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum Permission {
    /// `e`: change into a directory.
    Enter,
    /// `l`: list a directory.
    List,
    /// `r`: read a file.
    Read,
    /// `a`: append to a file.
    Append,
    /// `d`: delete a file.
    Delete,
    /// `f`: rename.
    Rename,
    /// `m`: create a directory.
    MakeDir,
    /// `w`: write (store) a file.
    Write,
    /// `M`: remove a directory.
    RemoveDir,
    /// `T`: set a file's modification time.
    SetTime,
}

impl Permission {
    pub fn as_char(self) -> char {
        match self {
            Permission::Enter => 'e',
            Permission::List => 'l',
            Permission::Read => 'r',
            Permission::Append => 'a',
            Permission::Delete => 'd',
            Permission::Rename => 'f',
            Permission::MakeDir => 'm',
            Permission::Write => 'w',
            Permission::RemoveDir => 'M',
            Permission::SetTime => 'T',
        }
    }

    /// Case-sensitive: `m` and `M` are different flags.
    pub fn from_char(c: char) -> Option<Self> {
        Permission::iter().find(|p| p.as_char() == c)
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A set of [`Permission`]s.
///
/// Parsed from and rendered as the compact string form (`"elradfmwMT"`);
/// rendering always uses alphabet order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionSet(u16);

impl PermissionSet {
    pub const EMPTY: PermissionSet = PermissionSet(0);

    /// Parse a permission string. Fails on the first character outside the
    /// alphabet, returning it.
    pub fn parse(s: &str) -> Result<Self, char> {
        s.chars().try_fold(Self::EMPTY, |set, c| {
            Permission::from_char(c).map(|p| set.with(p)).ok_or(c)
        })
    }

    pub fn with(self, perm: Permission) -> Self {
        Self(self.0 | perm.bit())
    }

    pub fn contains(self, perm: Permission) -> bool {
        self.0 & perm.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, PermissionSet::with)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in self.iter() {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionSet({self})")
    }
}

impl TryFrom<String> for PermissionSet {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).map_err(|c| format!("unknown permission {c:?} in {s:?}"))
    }
}

impl From<PermissionSet> for String {
    fn from(set: PermissionSet) -> Self {
        set.to_string()
    }
}

/// Named permission bundles offered by the admin tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum PermissionPreset {
    /// `elr`
    ReadOnly,
    /// `elradfmw`
    ReadWrite,
    /// `elradfmwMT`
    Full,
}

impl PermissionPreset {
    pub fn permissions(self) -> PermissionSet {
        use Permission::*;
        match self {
            PermissionPreset::ReadOnly => [Enter, List, Read].into_iter().collect(),
            PermissionPreset::ReadWrite => {
                [Enter, List, Read, Append, Delete, Rename, MakeDir, Write]
                    .into_iter()
                    .collect()
            }
            PermissionPreset::Full => Permission::iter().collect(),
        }
    }
}

/// Accept either a preset name or a raw permission string.
pub fn parse_permissions(s: &str) -> Result<PermissionSet, String> {
    if let Ok(preset) = s.parse::<PermissionPreset>() {
        return Ok(preset.permissions());
    }
    PermissionSet::try_from(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_in_alphabet_order() {
        let set = PermissionSet::parse("rle").unwrap();
        assert_eq!(set.to_string(), "elr");
        assert!(set.contains(Permission::Read));
        assert!(!set.contains(Permission::Write));
    }

    #[test]
    fn case_matters() {
        let set = PermissionSet::parse("m").unwrap();
        assert!(set.contains(Permission::MakeDir));
        assert!(!set.contains(Permission::RemoveDir));
        assert_eq!(PermissionSet::parse("elx"), Err('x'));
        assert_eq!(PermissionSet::parse("E"), Err('E'));
    }

    #[test]
    fn presets() {
        assert_eq!(PermissionPreset::ReadOnly.permissions().to_string(), "elr");
        assert_eq!(PermissionPreset::ReadWrite.permissions().to_string(), "elradfmw");
        assert_eq!(PermissionPreset::Full.permissions().to_string(), "elradfmwMT");
        assert_eq!(parse_permissions("Read-Only").unwrap().to_string(), "elr");
        assert_eq!(parse_permissions("elrw").unwrap().to_string(), "elrw");
        assert!(parse_permissions("bogus").is_err());
    }
}
