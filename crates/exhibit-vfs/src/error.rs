//! VFS error types.
//!
//! One taxonomy for every backend. Backends translate their native failures
//! into these variants; anything that doesn't fit goes into
//! [`VfsError::Backend`] (or [`VfsError::Io`] for host I/O).

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No entry at the given path.
    #[error("not found: {0}")]
    NotFound(String),

    /// File operation attempted on a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory operation attempted on a non-directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Link operation attempted on something that isn't a symlink.
    #[error("not a symbolic link: {0}")]
    NotASymlink(String),

    /// A symlink cycle was detected while resolving.
    #[error("symlink recursion: {0}")]
    SymlinkRecursion(String),

    /// The operation has no meaning in a read-only evidence namespace.
    #[error("{op}() is unsupported")]
    Unsupported {
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// A mount point with this name already exists.
    #[error("mount point already exists: {0}")]
    MountExists(String),

    /// Paths from two different namespaces were combined.
    #[error("paths belong to different namespaces: {left} and {right}")]
    CrossNamespace {
        /// Left-hand path.
        left: String,
        /// Right-hand path.
        right: String,
    },

    /// Invalid path or path component.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Glob pattern could not be compiled.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Namespace configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error from a host-backed adapter.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Backend-specific failure not covered by the other variants.
    #[error("backend error: {0}")]
    Backend(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a NotASymlink error.
    pub fn not_a_symlink(path: impl Into<String>) -> Self {
        Self::NotASymlink(path.into())
    }

    /// Create a SymlinkRecursion error.
    pub fn symlink_recursion(path: impl Into<String>) -> Self {
        Self::SymlinkRecursion(path.into())
    }

    /// Create an Unsupported error naming the operation.
    pub fn unsupported(op: &'static str) -> Self {
        Self::Unsupported { op }
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a Backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Returns true for [`VfsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::NotASymlink(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::SymlinkRecursion(msg) => {
                io::Error::other(format!("symlink recursion: {msg}"))
            }
            VfsError::Unsupported { op } => io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{op}() is unsupported"),
            ),
            e @ VfsError::MountExists(_) => io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()),
            e @ (VfsError::CrossNamespace { .. }
            | VfsError::InvalidPath(_)
            | VfsError::InvalidPattern(_)
            | VfsError::Config(_)) => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            VfsError::Io(e) => e,
            VfsError::Backend(msg) => io::Error::other(msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_names_operation() {
        let err = VfsError::unsupported("VfsPath::mkdir");
        assert_eq!(err.to_string(), "VfsPath::mkdir() is unsupported");
    }

    #[test]
    fn test_io_error_kinds() {
        let io: io::Error = VfsError::not_found("/x").into();
        assert_eq!(io.kind(), io::ErrorKind::NotFound);

        let io: io::Error = VfsError::is_a_directory("/d").into();
        assert_eq!(io.kind(), io::ErrorKind::IsADirectory);

        let io: io::Error = VfsError::unsupported("chmod").into();
        assert_eq!(io.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_io_passthrough() {
        let original = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err = VfsError::from(original);
        let back: io::Error = err.into();
        assert_eq!(back.kind(), io::ErrorKind::PermissionDenied);
    }
}
