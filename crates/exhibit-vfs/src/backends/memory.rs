//! In-memory mapped backend.
//!
//! Format adapters that decode a whole container up front (segmented images,
//! backup archives) map their files into a `MemoryBackend` and mount that.
//! Mapping happens during setup; lookups afterwards only take read locks.
//! Foreign entries can be mapped in as-is with [`MemoryBackend::map_entry`],
//! so an adapter doesn't have to copy file contents into memory.

use std::io::Cursor;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{VfsError, VfsResult};
use crate::ops::{join_backend_path, BackendEntry, Children, EntryRef, FilesystemBackend, ReadSeek};
use crate::types::Timestamps;

/// A child slot in a directory.
#[derive(Debug, Clone)]
struct Slot {
    /// Name as mapped (not folded).
    name: String,
    entry: EntryRef,
    /// Set when the child is one of our own directories, so mapping can
    /// descend into it.
    dir: Option<Arc<MemoryEntry>>,
}

#[derive(Debug)]
enum Node {
    File(Arc<[u8]>),
    Directory(RwLock<IndexMap<String, Slot>>),
    Symlink(String),
}

/// Entry in the memory filesystem.
#[derive(Debug)]
pub struct MemoryEntry {
    path: String,
    case_sensitive: bool,
    times: Timestamps,
    node: Node,
}

impl MemoryEntry {
    fn directory(path: String, case_sensitive: bool) -> Self {
        Self {
            path,
            case_sensitive,
            times: Timestamps::default(),
            node: Node::Directory(RwLock::new(IndexMap::new())),
        }
    }

    fn fold(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    fn slots(&self) -> VfsResult<&RwLock<IndexMap<String, Slot>>> {
        match &self.node {
            Node::Directory(slots) => Ok(slots),
            _ => Err(VfsError::not_a_directory(&self.path)),
        }
    }
}

impl BackendEntry for MemoryEntry {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_dir(&self) -> bool {
        matches!(self.node, Node::Directory(_))
    }

    fn is_file(&self) -> bool {
        matches!(self.node, Node::File(_))
    }

    fn is_symlink(&self) -> bool {
        matches!(self.node, Node::Symlink(_))
    }

    fn list_children(&self) -> VfsResult<Children> {
        let slots = self.slots()?.read();
        Ok(slots
            .values()
            .map(|slot| (slot.name.clone(), Arc::clone(&slot.entry)))
            .collect())
    }

    fn child(&self, name: &str) -> VfsResult<EntryRef> {
        let slots = self.slots()?.read();
        slots
            .get(&self.fold(name))
            .map(|slot| Arc::clone(&slot.entry))
            .ok_or_else(|| VfsError::not_found(join_backend_path(&self.path, name)))
    }

    fn open(&self) -> VfsResult<Box<dyn ReadSeek>> {
        match &self.node {
            Node::File(data) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
            Node::Directory(_) => Err(VfsError::is_a_directory(&self.path)),
            Node::Symlink(_) => Err(VfsError::backend(format!(
                "cannot open symlink directly: {}",
                self.path
            ))),
        }
    }

    fn read_link(&self) -> VfsResult<String> {
        match &self.node {
            Node::Symlink(target) => Ok(target.clone()),
            _ => Err(VfsError::not_a_symlink(&self.path)),
        }
    }

    fn size(&self) -> VfsResult<u64> {
        Ok(match &self.node {
            Node::File(data) => data.len() as u64,
            Node::Directory(_) => 0,
            Node::Symlink(target) => target.len() as u64,
        })
    }

    fn times(&self) -> Timestamps {
        self.times
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via per-directory `RwLock`s. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    case_sensitive: bool,
    root: Arc<MemoryEntry>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            root: Arc::new(MemoryEntry::directory(String::new(), case_sensitive)),
        }
    }

    /// Map a regular file at `path`, creating parent directories.
    pub fn map_file(&self, path: &str, data: impl Into<Vec<u8>>) -> VfsResult<()> {
        self.map_file_with_times(path, data, Timestamps::default())
    }

    /// Map a regular file with explicit timestamps.
    pub fn map_file_with_times(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
        times: Timestamps,
    ) -> VfsResult<()> {
        let data: Vec<u8> = data.into();
        let data: Arc<[u8]> = data.into();
        self.insert(path, |path, case_sensitive| {
            Arc::new(MemoryEntry {
                path,
                case_sensitive,
                times,
                node: Node::File(data),
            }) as EntryRef
        })
    }

    /// Map a directory at `path`. Mapping an existing directory is a no-op.
    pub fn map_dir(&self, path: &str) -> VfsResult<()> {
        let parts = Self::split(path)?;
        self.dir_at(&parts).map(|_| ())
    }

    /// Map a symbolic link at `path` pointing to `target`.
    pub fn symlink(&self, path: &str, target: impl Into<String>) -> VfsResult<()> {
        let target = target.into();
        self.insert(path, |path, case_sensitive| {
            Arc::new(MemoryEntry {
                path,
                case_sensitive,
                times: Timestamps::default(),
                node: Node::Symlink(target),
            }) as EntryRef
        })
    }

    /// Map an entry owned by another adapter at `path`.
    pub fn map_entry(&self, path: &str, entry: EntryRef) -> VfsResult<()> {
        self.insert(path, |_, _| entry)
    }

    /// Split a backend path, rejecting `..`.
    fn split(path: &str) -> VfsResult<Vec<&str>> {
        let parts: Vec<&str> = path
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        if parts.contains(&"..") {
            return Err(VfsError::invalid_path(path));
        }
        Ok(parts)
    }

    /// Walk to the directory at `parts`, creating missing ones.
    fn dir_at(&self, parts: &[&str]) -> VfsResult<Arc<MemoryEntry>> {
        let mut current = Arc::clone(&self.root);
        for part in parts {
            let next = {
                let mut slots = current.slots()?.write();
                let key = current.fold(part);
                match slots.get(&key) {
                    Some(Slot { dir: Some(dir), .. }) => Arc::clone(dir),
                    Some(slot) if slot.entry.is_dir() => {
                        return Err(VfsError::invalid_path(format!(
                            "cannot map below foreign directory: {}",
                            slot.entry.path()
                        )));
                    }
                    Some(slot) => return Err(VfsError::not_a_directory(slot.entry.path())),
                    None => {
                        let path = join_backend_path(&current.path, part);
                        let dir = Arc::new(MemoryEntry::directory(path, self.case_sensitive));
                        slots.insert(
                            key,
                            Slot {
                                name: part.to_string(),
                                entry: Arc::clone(&dir) as EntryRef,
                                dir: Some(Arc::clone(&dir)),
                            },
                        );
                        dir
                    }
                }
            };
            current = next;
        }
        Ok(current)
    }

    /// Insert a leaf, replacing whatever was mapped there before.
    fn insert(
        &self,
        path: &str,
        make: impl FnOnce(String, bool) -> EntryRef,
    ) -> VfsResult<()> {
        let parts = Self::split(path)?;
        let Some((name, parents)) = parts.split_last() else {
            return Err(VfsError::invalid_path("cannot replace the root directory"));
        };

        let parent = self.dir_at(parents)?;
        let entry = make(join_backend_path(&parent.path, name), self.case_sensitive);
        let mut slots = parent.slots()?.write();
        slots.insert(
            parent.fold(name),
            Slot {
                name: name.to_string(),
                entry,
                dir: None,
            },
        );
        Ok(())
    }
}

impl FilesystemBackend for MemoryBackend {
    fn lookup(&self, path: &str) -> VfsResult<EntryRef> {
        let mut current: EntryRef = Arc::clone(&self.root) as EntryRef;
        for part in Self::split(path)? {
            current = current.child(part)?;
        }
        Ok(current)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(fs: &MemoryBackend, path: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        fs.lookup(path)
            .unwrap()
            .open()
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn test_map_and_read() {
        let fs = MemoryBackend::new(true);
        fs.map_file("test.txt", b"hello world".to_vec()).unwrap();
        assert_eq!(read_all(&fs, "test.txt"), b"hello world");
        assert_eq!(fs.lookup("test.txt").unwrap().size().unwrap(), 11);
    }

    #[test]
    fn test_children_in_insertion_order() {
        let fs = MemoryBackend::new(true);
        fs.map_file("dir/zulu", b"".to_vec()).unwrap();
        fs.map_file("dir/alpha", b"".to_vec()).unwrap();
        fs.map_dir("dir/mike").unwrap();

        let names: Vec<_> = fs
            .lookup("dir")
            .unwrap()
            .list_children()
            .unwrap()
            .into_keys()
            .collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_auto_create_parents() {
        let fs = MemoryBackend::new(true);
        fs.map_file("a/b/c/file.txt", b"x".to_vec()).unwrap();

        assert!(fs.lookup("a").unwrap().is_dir());
        assert!(fs.lookup("a/b").unwrap().is_dir());
        assert!(fs.lookup("a/b/c").unwrap().is_dir());
    }

    #[test]
    fn test_path_normalization() {
        let fs = MemoryBackend::new(true);
        fs.map_file("/a/b/c.txt", b"x".to_vec()).unwrap();

        assert!(fs.lookup("a/b/c.txt").is_ok());
        assert!(fs.lookup("/a/b/c.txt").is_ok());
        assert!(fs.lookup("a/./b//c.txt").is_ok());
        assert!(matches!(fs.lookup("a/../a/b/c.txt"), Err(VfsError::InvalidPath(_))));
    }

    #[test]
    fn test_symlink() {
        let fs = MemoryBackend::new(true);
        fs.symlink("link", "/target/path").unwrap();

        let entry = fs.lookup("link").unwrap();
        assert!(entry.is_symlink());
        assert!(!entry.is_file());
        assert_eq!(entry.read_link().unwrap(), "/target/path");
    }

    #[test]
    fn test_read_link_on_file() {
        let fs = MemoryBackend::new(true);
        fs.map_file("file", b"x".to_vec()).unwrap();
        let entry = fs.lookup("file").unwrap();
        assert!(matches!(entry.read_link(), Err(VfsError::NotASymlink(_))));
    }

    #[test]
    fn test_open_directory_fails() {
        let fs = MemoryBackend::new(true);
        fs.map_dir("dir").unwrap();
        assert!(matches!(
            fs.lookup("dir").unwrap().open(),
            Err(VfsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_list_file_fails() {
        let fs = MemoryBackend::new(true);
        fs.map_file("file", b"x".to_vec()).unwrap();
        assert!(matches!(
            fs.lookup("file").unwrap().list_children(),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(fs.lookup("file/below"), Err(VfsError::NotADirectory(_))));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let fs = MemoryBackend::new(false);
        fs.map_file("Windows/System32/config/SYSTEM", b"regf".to_vec()).unwrap();

        let a = fs.lookup("windows/system32/CONFIG/system").unwrap();
        let b = fs.lookup("Windows/System32/config/SYSTEM").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let names: Vec<_> = fs.lookup("").unwrap().list_children().unwrap().into_keys().collect();
        assert_eq!(names, vec!["Windows"]);
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let fs = MemoryBackend::new(true);
        fs.map_file("Foo", b"x".to_vec()).unwrap();
        assert!(fs.lookup("Foo").is_ok());
        assert!(matches!(fs.lookup("foo"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_map_foreign_entry() {
        let source = MemoryBackend::new(true);
        source.map_file("payload.bin", b"\x00\x01".to_vec()).unwrap();

        let fs = MemoryBackend::new(true);
        fs.map_entry("mapped/blob", source.lookup("payload.bin").unwrap()).unwrap();

        assert_eq!(read_all(&fs, "mapped/blob"), b"\x00\x01");
    }

    #[test]
    fn test_map_below_file_fails() {
        let fs = MemoryBackend::new(true);
        fs.map_file("file", b"x".to_vec()).unwrap();
        assert!(matches!(
            fs.map_file("file/child", b"y".to_vec()),
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_remap_replaces_file() {
        let fs = MemoryBackend::new(true);
        fs.map_file("file", b"old".to_vec()).unwrap();
        fs.map_file("file", b"new".to_vec()).unwrap();
        assert_eq!(read_all(&fs, "file"), b"new");
    }

    #[test]
    fn test_timestamps() {
        let t = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let fs = MemoryBackend::new(true);
        fs.map_file_with_times("log", b"x".to_vec(), Timestamps::uniform(t)).unwrap();
        assert_eq!(fs.lookup("log").unwrap().times().mtime, t);
        assert_eq!(fs.lookup("").unwrap().times(), Timestamps::default());
    }
}
