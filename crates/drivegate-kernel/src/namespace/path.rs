//! Drive letters, native paths and virtual paths.
//!
//! Native paths are kept in drive-qualified form (`D:\data\file.txt`)
//! regardless of the host OS; a [`DriveSource`](super::DriveSource) maps a
//! drive letter onto the host directory that backs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{GateError, GateResult};

/// Native path separator.
pub const NATIVE_SEPARATOR: char = '\\';

/// A single uppercase drive letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct DriveLetter(char);

impl DriveLetter {
    /// Create a drive letter, uppercasing it. Returns `None` for non-letters.
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_alphabetic().then(|| Self(c.to_ascii_uppercase()))
    }

    /// Parse a one-character string.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::new(c)
    }

    /// Every possible letter, `A` through `Z`.
    pub fn all() -> impl Iterator<Item = Self> {
        ('A'..='Z').map(Self)
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// The native root of this drive (`X:\`).
    pub fn native_root(self) -> NativePath {
        NativePath {
            drive: self,
            segments: Vec::new(),
        }
    }
}

impl TryFrom<char> for DriveLetter {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::new(c).ok_or_else(|| format!("not a drive letter: {c:?}"))
    }
}

impl From<DriveLetter> for char {
    fn from(d: DriveLetter) -> Self {
        d.0
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A drive-qualified native path, normalized.
///
/// Separators are `\`, the drive letter is uppercase, `.` segments are
/// dropped and `..` segments are folded (never above the drive root).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativePath {
    drive: DriveLetter,
    segments: Vec<String>,
}

impl NativePath {
    /// Parse a native path such as `C:`, `c:\`, `D:\data\x` or `D:/data/x`.
    pub fn parse(s: &str) -> Option<Self> {
        let (drive, rest) = split_drive_spec(s)?;
        let mut path = drive.native_root();
        path.push_relative(rest);
        Some(path)
    }

    pub fn drive(&self) -> DriveLetter {
        self.drive
    }

    /// Path segments below the drive root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True for `X:\`.
    pub fn is_drive_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parent directory. The parent of a drive root is the drive root.
    pub fn parent(&self) -> NativePath {
        let mut parent = self.clone();
        parent.segments.pop();
        parent
    }

    /// Join a relative path (either separator) and normalize the result.
    pub fn join(&self, relative: &str) -> NativePath {
        let mut joined = self.clone();
        joined.push_relative(relative);
        joined
    }

    /// Last segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if `self` equals `base` or lies beneath it.
    pub fn is_within(&self, base: &NativePath) -> bool {
        self.drive == base.drive
            && self.segments.len() >= base.segments.len()
            && self.segments.iter().zip(&base.segments).all(|(a, b)| a == b)
    }

    /// The host path backing this native path, given the drive's host root.
    pub fn host_path(&self, host_root: &Path) -> PathBuf {
        let mut path = host_root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }

    fn push_relative(&mut self, relative: &str) {
        for segment in relative.split(['\\', '/']) {
            match segment {
                "" | "." => {}
                ".." => {
                    self.segments.pop();
                }
                other => self.segments.push(other.to_string()),
            }
        }
    }
}

impl fmt::Display for NativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.drive, NATIVE_SEPARATOR)?;
        write!(f, "{}", self.segments.join("\\"))
    }
}

/// Split `X:` / `X:\rest` into the drive and the remainder.
pub(crate) fn split_drive_spec(s: &str) -> Option<(DriveLetter, &str)> {
    let mut chars = s.chars();
    let letter = chars.next()?;
    if chars.next()? != ':' {
        return None;
    }
    let drive = DriveLetter::new(letter)?;
    let rest = &s[2..];
    if !(rest.is_empty() || rest.starts_with(['\\', '/'])) {
        return None;
    }
    Some((drive, rest))
}

/// An absolute path in the synthetic namespace.
///
/// Always starts with `/`, never ends with one (except the root itself) and
/// names a drive in its first segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// The root `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// `/X` for a drive.
    pub fn drive(letter: DriveLetter) -> Self {
        Self(format!("/{letter}"))
    }

    /// Parse and normalize an absolute virtual path.
    ///
    /// `.` is dropped, `..` is folded and clamped at `/`, the drive segment
    /// is uppercased. Fails if the first segment is not a drive letter.
    pub fn new(s: &str) -> GateResult<Self> {
        if !s.starts_with('/') {
            return Err(GateError::invalid_path(format!("not absolute: {s}")));
        }
        let mut segments: Vec<&str> = Vec::new();
        for segment in s.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Self::root());
        };
        let drive = DriveLetter::parse(first)
            .ok_or_else(|| GateError::not_found(format!("no drive named {first}")))?;
        let mut out = format!("/{drive}");
        for segment in rest {
            out.push('/');
            out.push_str(segment);
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The drive this path lives on, `None` for the root.
    pub fn drive_letter(&self) -> Option<DriveLetter> {
        self.0.get(1..2).and_then(DriveLetter::parse)
    }

    /// True for `/X`.
    pub fn is_drive(&self) -> bool {
        self.0.len() == 2 && self.drive_letter().is_some()
    }

    /// Map onto the native side without touching the filesystem.
    pub fn to_target(&self) -> Target {
        let Some(drive) = self.drive_letter() else {
            return Target::Root;
        };
        Target::Native(drive.native_root().join(self.0.get(2..).unwrap_or("")))
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved location: the drive picker root, or a native path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The synthetic "all drives" root.
    Root,
    /// A location on a drive.
    Native(NativePath),
}

impl Target {
    pub fn is_root(&self) -> bool {
        matches!(self, Target::Root)
    }

    pub fn native(&self) -> Option<&NativePath> {
        match self {
            Target::Root => None,
            Target::Native(path) => Some(path),
        }
    }

    /// The virtual path naming this target.
    pub fn to_virtual(&self) -> VirtualPath {
        let Target::Native(path) = self else {
            return VirtualPath::root();
        };
        let mut out = format!("/{}", path.drive());
        for segment in path.segments() {
            out.push('/');
            out.push_str(segment);
        }
        VirtualPath(out)
    }

    /// Parse a home directory or store value: `/` or a native path.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "/" || s.is_empty() {
            Some(Target::Root)
        } else {
            NativePath::parse(s).map(Target::Native)
        }
    }
}

impl From<NativePath> for Target {
    fn from(path: NativePath) -> Self {
        Target::Native(path)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Root => f.write_str("/"),
            Target::Native(path) => path.fmt(f),
        }
    }
}
