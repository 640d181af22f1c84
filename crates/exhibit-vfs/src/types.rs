//! Core VFS types.
//!
//! Evidence backends have no native inode numbers, uid/gid or reliable
//! timestamps, so [`StatRecord`] is synthesized (see [`crate::stat`]) rather
//! than read from the container.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Directory file-type bits.
pub const S_IFDIR: u32 = 0o040_000;
/// Regular-file file-type bits.
pub const S_IFREG: u32 = 0o100_000;
/// Mask selecting the file-type bits of a mode.
pub const S_IFMT: u32 = 0o170_000;

/// File type enumeration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
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

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// Timestamps a backend may supply. Unknown times are the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Change (or creation) time.
    pub ctime: SystemTime,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
        }
    }
}

impl Timestamps {
    /// All three timestamps set to `t`.
    pub fn uniform(t: SystemTime) -> Self {
        Self {
            atime: t,
            mtime: t,
            ctime: t,
        }
    }
}

/// Stat-like record for a path inside a namespace.
///
/// `ino` is a hash of the normalized path, `dev` identifies the namespace.
/// Link count is always 1 and ownership is always 0 (unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    /// File-type bits plus permission bits.
    pub mode: u32,
    /// Pseudo-inode address.
    pub ino: u64,
    /// Namespace identity token.
    pub dev: u64,
    /// Number of hard links.
    pub nlink: u32,
    /// User ID.
    pub uid: u32,
    /// Group ID.
    pub gid: u32,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Change time.
    pub ctime: SystemTime,
}

impl StatRecord {
    /// Returns true if the file-type bits say directory.
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Returns true if the file-type bits say regular file.
    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }
}

/// Identity of a namespace (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(uuid::Uuid);

impl NamespaceId {
    /// Create a new time-ordered ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// 64-bit token used as the `dev` field of stat records.
    pub fn device(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo
    }

    /// First 8 hex characters, for log output only.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }
}

impl Default for NamespaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceId({})", self.short())
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
