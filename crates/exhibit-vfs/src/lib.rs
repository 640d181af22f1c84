//! # exhibit-vfs
//!
//! One path interface over forensic evidence.
//!
//! Disk images, segmented archives and acquired filesystem dumps each come
//! with their own adapter; this crate composes them into a single namespace
//! and lets analysis code traverse, stat, read and resolve symlinks as if the
//! evidence were a live filesystem. Everything is read-only.
//!
//! Key components:
//!
//! - [`FilesystemBackend`] / [`BackendEntry`] - Contract every adapter implements
//! - [`Namespace`] - Mount table, anonymous roots, dispatch to backends
//! - [`VfsPath`] - Namespace-bound path with resolve/walk/glob
//! - [`Flavor`] - Case and separator dialect of a namespace
//! - [`MemoryBackend`] - Mapped in-memory tree that adapters populate
//! - [`DirectoryBackend`] - Extracted evidence in a host directory
//!
//! ## Design Decisions
//!
//! - **Synthesized stat**: backends have no inode numbers we can trust, so
//!   `ino` is a hash of the normalized path and `dev` identifies the
//!   namespace. Same path, same address, across remounts.
//! - **Lexical `..` only after resolution**: `..` is kept in path components
//!   and applied to the resolved string, like a real resolver.
//! - **Setup, then read**: mounts are added while the evidence source is
//!   opened; lookups afterwards only take read locks.
//!
//! ```
//! use std::sync::Arc;
//! use exhibit_vfs::{MemoryBackend, Namespace};
//!
//! let fs = MemoryBackend::new(true);
//! fs.map_file("dir/file.txt", b"hello".to_vec())?;
//!
//! let ns = Arc::new(Namespace::default());
//! ns.mount("/", Arc::new(fs))?;
//!
//! let path = ns.path("/dir/file.txt");
//! assert_eq!(path.read_bytes()?, b"hello");
//! assert_eq!(path.stat()?.size, 5);
//! # Ok::<(), exhibit_vfs::VfsError>(())
//! ```

pub mod backends;
pub mod config;
mod error;
pub mod flavor;
mod glob;
mod mount;
mod ops;
mod path;
mod resolve;
pub mod stat;
mod types;
mod walk;

pub use backends::{DirectoryBackend, MemoryBackend};
pub use config::NamespaceConfig;
pub use error::{VfsError, VfsResult};
pub use flavor::{Flavor, GlobMatcher};
pub use mount::{MountInfo, Namespace};
pub use ops::{BackendEntry, Children, EntryRef, FilesystemBackend, ReadSeek};
pub use path::{DirEntry, ScanDir, VfsPath};
pub use types::{FileType, NamespaceId, StatRecord, Timestamps, S_IFDIR, S_IFMT, S_IFREG};
pub use walk::{Walk, WalkEntry};
