//! Filesystem backends.
//!
//! Backends implement [`FilesystemBackend`](crate::ops::FilesystemBackend)
//! over different evidence sources.

mod directory;
mod memory;

pub use directory::{DirectoryBackend, DirectoryEntry};
pub use memory::{MemoryBackend, MemoryEntry};
