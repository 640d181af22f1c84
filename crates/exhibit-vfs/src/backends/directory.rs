//! Host directory backend.
//!
//! Exposes an acquired filesystem that was extracted to a directory on the
//! analysis host. Read-only, and it never lets the host OS follow symlinks on
//! its behalf: lookups walk one component at a time with `symlink_metadata`,
//! so a link inside the evidence can't point the walk outside `root`. Links
//! are reported as links and left for the namespace resolver to interpret.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{VfsError, VfsResult};
use crate::ops::{join_backend_path, BackendEntry, Children, EntryRef, FilesystemBackend, ReadSeek};
use crate::types::Timestamps;

/// Map a host I/O error, keeping "not found" in the shared taxonomy.
fn map_io(err: io::Error, path: &str) -> VfsError {
    match err.kind() {
        io::ErrorKind::NotFound => VfsError::not_found(path),
        io::ErrorKind::NotADirectory => VfsError::not_a_directory(path),
        _ => VfsError::Io(err),
    }
}

/// Read-only view of a directory on the analysis host.
///
/// All lookups are relative to `root`. For example, if `root` is
/// `/cases/42/fs`, then `lookup("etc/passwd")` reads
/// `/cases/42/fs/etc/passwd`.
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
    case_sensitive: bool,
}

impl DirectoryBackend {
    /// Create a backend rooted at `root`.
    ///
    /// The root is canonicalized once here; it must exist and be a directory.
    pub fn new(root: impl Into<PathBuf>) -> VfsResult<Self> {
        let root: PathBuf = root.into();
        let display = root.display().to_string();
        let root = dunce::canonicalize(&root).map_err(|e| map_io(e, &display))?;
        if !root.is_dir() {
            return Err(VfsError::not_a_directory(display));
        }
        Ok(Self {
            root,
            case_sensitive: true,
        })
    }

    /// Declare the extracted filesystem case-insensitive.
    ///
    /// Only affects how the namespace treats this backend; name matching
    /// itself is done by the host.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, path: String, host: PathBuf) -> VfsResult<DirectoryEntry> {
        let meta = fs::symlink_metadata(&host).map_err(|e| map_io(e, &path))?;
        Ok(DirectoryEntry { path, host, meta })
    }
}

impl FilesystemBackend for DirectoryBackend {
    fn lookup(&self, path: &str) -> VfsResult<EntryRef> {
        let mut current = self.entry(String::new(), self.root.clone())?;
        for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            if part == ".." {
                return Err(VfsError::invalid_path(format!("{path} escapes {}", self.root.display())));
            }
            if !current.meta.is_dir() {
                return Err(VfsError::not_a_directory(current.path));
            }
            let child_path = join_backend_path(&current.path, part);
            current = self.entry(child_path, current.host.join(part))?;
        }
        Ok(std::sync::Arc::new(current))
    }

    fn kind(&self) -> &'static str {
        "directory"
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// A file, directory or link inside a [`DirectoryBackend`].
#[derive(Debug)]
pub struct DirectoryEntry {
    path: String,
    host: PathBuf,
    meta: fs::Metadata,
}

impl BackendEntry for DirectoryEntry {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_dir(&self) -> bool {
        self.meta.is_dir()
    }

    fn is_file(&self) -> bool {
        self.meta.is_file()
    }

    fn is_symlink(&self) -> bool {
        self.meta.file_type().is_symlink()
    }

    fn list_children(&self) -> VfsResult<Children> {
        if !self.is_dir() {
            return Err(VfsError::not_a_directory(&self.path));
        }

        let mut children: Children = IndexMap::new();
        for dirent in fs::read_dir(&self.host).map_err(|e| map_io(e, &self.path))? {
            let dirent = dirent?;
            let Ok(name) = dirent.file_name().into_string() else {
                warn!(dir = %self.path, host = %dirent.path().display(), "skipping non-UTF-8 name");
                continue;
            };
            let path = join_backend_path(&self.path, &name);
            let meta = dirent.metadata().map_err(|e| map_io(e, &path))?;
            let child = DirectoryEntry {
                path,
                host: dirent.path(),
                meta,
            };
            children.insert(name, std::sync::Arc::new(child));
        }
        Ok(children)
    }

    fn child(&self, name: &str) -> VfsResult<EntryRef> {
        if !self.is_dir() {
            return Err(VfsError::not_a_directory(&self.path));
        }
        let path = join_backend_path(&self.path, name);
        let host = self.host.join(name);
        let meta = fs::symlink_metadata(&host).map_err(|e| map_io(e, &path))?;
        Ok(std::sync::Arc::new(DirectoryEntry { path, host, meta }))
    }

    fn open(&self) -> VfsResult<Box<dyn ReadSeek>> {
        if self.is_dir() {
            return Err(VfsError::is_a_directory(&self.path));
        }
        let file = fs::File::open(&self.host).map_err(|e| map_io(e, &self.path))?;
        Ok(Box::new(file))
    }

    fn read_link(&self) -> VfsResult<String> {
        if !self.is_symlink() {
            return Err(VfsError::not_a_symlink(&self.path));
        }
        let target = fs::read_link(&self.host).map_err(|e| map_io(e, &self.path))?;
        target
            .into_os_string()
            .into_string()
            .map_err(|_| VfsError::backend(format!("symlink target is not UTF-8: {}", self.path)))
    }

    fn size(&self) -> VfsResult<u64> {
        Ok(if self.is_dir() { 0 } else { self.meta.len() })
    }

    fn times(&self) -> Timestamps {
        let mtime = self.meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Timestamps {
            atime: self.meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
            mtime,
            ctime: self.meta.created().unwrap_or(mtime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn setup() -> (DirectoryBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("etc/ssh")).unwrap();
        std::fs::write(dir.path().join("etc/hostname"), "evidence-host\n").unwrap();
        let backend = DirectoryBackend::new(dir.path()).unwrap();
        (backend, dir)
    }

    #[test]
    fn test_lookup_and_read() {
        let (backend, _dir) = setup();
        let entry = backend.lookup("etc/hostname").unwrap();
        assert!(entry.is_file());
        assert_eq!(entry.size().unwrap(), 14);

        let mut buf = String::new();
        entry.open().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "evidence-host\n");
    }

    #[test]
    fn test_list_children() {
        let (backend, _dir) = setup();
        let mut names: Vec<_> = backend
            .lookup("etc")
            .unwrap()
            .list_children()
            .unwrap()
            .into_keys()
            .collect();
        names.sort();
        assert_eq!(names, vec!["hostname", "ssh"]);
    }

    #[test]
    fn test_root_lookup() {
        let (backend, _dir) = setup();
        assert!(backend.lookup("").unwrap().is_dir());
        assert!(backend.lookup("/").unwrap().is_dir());
    }

    #[test]
    fn test_missing() {
        let (backend, _dir) = setup();
        assert!(matches!(backend.lookup("etc/shadow"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_escape_prevention() {
        let (backend, _dir) = setup();
        assert!(matches!(backend.lookup("../etc/passwd"), Err(VfsError::InvalidPath(_))));
    }

    #[test]
    fn test_open_directory_fails() {
        let (backend, _dir) = setup();
        let entry = backend.lookup("etc").unwrap();
        assert!(matches!(entry.open(), Err(VfsError::IsADirectory(_))));
    }

    #[test]
    fn test_new_requires_directory() {
        let (_backend, dir) = setup();
        assert!(matches!(
            DirectoryBackend::new(dir.path().join("etc/hostname")),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(matches!(
            DirectoryBackend::new(dir.path().join("nope")),
            Err(VfsError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let (backend, dir) = setup();
        std::os::unix::fs::symlink("/etc", dir.path().join("outside")).unwrap();
        std::os::unix::fs::symlink("hostname", dir.path().join("etc/name")).unwrap();

        let link = backend.lookup("outside").unwrap();
        assert!(link.is_symlink());
        assert_eq!(link.read_link().unwrap(), "/etc");
        assert!(matches!(backend.lookup("outside/passwd"), Err(VfsError::NotADirectory(_))));

        let name = backend.lookup("etc/name").unwrap();
        assert_eq!(name.read_link().unwrap(), "hostname");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_explicit() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (backend, dir) = setup();
        let raw = OsStr::from_bytes(b"caf\xe9.txt");
        std::fs::write(dir.path().join("etc").join(raw), "x").unwrap();
        std::os::unix::fs::symlink(raw, dir.path().join("etc/latin1")).unwrap();

        let etc = backend.lookup("etc").unwrap();
        let names: Vec<_> = etc.list_children().unwrap().into_keys().collect();
        assert!(names.iter().all(|n| n.as_str() != "caf\u{fffd}.txt"));
        assert!(names.contains(&"latin1".to_string()));
        for name in &names {
            assert!(etc.child(name).is_ok(), "{name}");
        }

        let link = backend.lookup("etc/latin1").unwrap();
        assert!(matches!(link.read_link(), Err(VfsError::Backend(_))));
    }
}
