//! Backend adapter contract.
//!
//! Every evidence-format driver implements [`FilesystemBackend`] (path lookup)
//! and hands out [`BackendEntry`] handles for the nodes it finds. The engine
//! only ever holds these handles through [`EntryRef`]; it never assumes an
//! entry stays valid past the backend call that produced it beyond what the
//! `Arc` itself guarantees.
//!
//! Nothing here writes. Capabilities a backend lacks fall back to the default
//! method bodies, which fail with a specific error instead of guessing.

use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{VfsError, VfsResult};
use crate::types::{FileType, Timestamps};

/// Shared handle to a backend node.
pub type EntryRef = Arc<dyn BackendEntry>;

/// Ordered child listing, in backend-reported order.
pub type Children = IndexMap<String, EntryRef>;

/// Byte stream returned by [`BackendEntry::open`].
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A filesystem as seen by the namespace.
///
/// Paths handed to `lookup` are relative to the backend root and use `/` as
/// separator; the empty string is the root itself. Backends apply their own
/// case rule.
pub trait FilesystemBackend: Send + Sync + fmt::Debug {
    /// Find the entry at `path`.
    fn lookup(&self, path: &str) -> VfsResult<EntryRef>;

    /// Short name of the adapter, used in log output.
    fn kind(&self) -> &'static str;

    /// Whether names compare case-sensitively inside this backend.
    fn case_sensitive(&self) -> bool {
        true
    }
}

/// One node (file, directory or symlink) inside a backend.
pub trait BackendEntry: Send + Sync + fmt::Debug {
    /// Backend-relative path, used in error messages.
    fn path(&self) -> &str;

    /// Returns true if this entry is a directory.
    fn is_dir(&self) -> bool;

    /// Returns true if this entry is a regular file.
    fn is_file(&self) -> bool;

    /// Returns true if this entry is a symbolic link.
    fn is_symlink(&self) -> bool {
        false
    }

    /// Children of a directory.
    ///
    /// Fails with `NotADirectory` for anything else.
    fn list_children(&self) -> VfsResult<Children>;

    /// Look up a single child by name.
    ///
    /// The default scans [`list_children`](Self::list_children) for an exact
    /// match; backends with an index should override it.
    fn child(&self, name: &str) -> VfsResult<EntryRef> {
        let mut children = self.list_children()?;
        children
            .swap_remove(name)
            .ok_or_else(|| VfsError::not_found(join_backend_path(self.path(), name)))
    }

    /// Open the entry's contents.
    ///
    /// Fails with `IsADirectory` for directories.
    fn open(&self) -> VfsResult<Box<dyn ReadSeek>>;

    /// Target of a symbolic link.
    ///
    /// Fails with `NotASymlink` for anything that isn't a link.
    fn read_link(&self) -> VfsResult<String> {
        Err(VfsError::not_a_symlink(self.path()))
    }

    /// Size of a file in bytes. Directories report 0.
    fn size(&self) -> VfsResult<u64>;

    /// Timestamps, when the container records them.
    fn times(&self) -> Timestamps {
        Timestamps::default()
    }

    /// Native file type.
    fn file_type(&self) -> FileType {
        if self.is_symlink() {
            FileType::Symlink
        } else if self.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        }
    }
}

/// Join a backend-relative directory path and a child name.
pub(crate) fn join_backend_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
