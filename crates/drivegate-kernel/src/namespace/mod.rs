//! Virtual drive namespace.
//!
//! Presents every mounted drive as one rooted tree:
//!
//! - [`NamespaceProvider`] - Operations the protocol engine calls
//! - [`NamespaceTranslator`] - The provider backed by a [`DriveSource`]
//! - [`DriveTable`] - Letter → host directory mapping, checked live
//! - [`VirtualPath`] / [`NativePath`] / [`Target`] - The two path spaces
//!
//! ## Design Decisions
//!
//! - **Windows-form native paths everywhere**: a native path is always
//!   `X:\...`, independent of the host. Only [`DriveSource`] knows which
//!   host directory a letter stands for, which keeps resolution and
//!   containment pure string work.
//! - **No caching**: drive mount state and directory contents are queried
//!   on every call.
//! - **Context-dependent `..`**: from `/` or a bare drive it lands on `/`;
//!   deeper it is the native parent.

mod drives;
mod ops;
mod path;
mod translator;
mod types;

pub use drives::{DriveSource, DriveTable};
pub use ops::NamespaceProvider;
pub use path::{DriveLetter, NATIVE_SEPARATOR, NativePath, Target, VirtualPath};
pub use translator::NamespaceTranslator;
pub use types::{DirEntry, FileAttr, FileType};
