//! Namespace-bound paths.
//!
//! A [`VfsPath`] is a value: a list of components, an absolute flag and the
//! namespace it belongs to. Comparison and hashing go through the namespace
//! flavor, so `/Windows` and `/windows` are the same path in a
//! case-insensitive namespace. Paths from different namespaces never compare
//! equal and can't be joined.
//!
//! Filesystem operations look entries up through the namespace with symlinks
//! in intermediate components followed. The entry found is cached on the
//! path, together with where it actually lives, so repeated `stat`/`open`
//! calls on the same value don't walk the backend again.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Read};
use std::sync::{Arc, OnceLock};

use indexmap::map::IntoIter;

use crate::error::{VfsError, VfsResult};
use crate::flavor::{collapse_dotdot, Flavor, SEP};
use crate::mount::Namespace;
use crate::ops::{EntryRef, ReadSeek};
use crate::resolve::resolve_str;
use crate::stat::stat_of;
use crate::types::{StatRecord, Timestamps};

/// A path inside a [`Namespace`].
#[derive(Clone)]
pub struct VfsPath {
    namespace: Arc<Namespace>,
    absolute: bool,
    parts: Vec<String>,
    located: OnceLock<Located>,
}

/// Where this path's entry actually lives: intermediate symlinks followed and
/// `..` applied, the final component left as is.
#[derive(Clone)]
struct Located {
    parts: Vec<String>,
    entry: EntryRef,
}

impl VfsPath {
    /// Parse `raw` with the namespace's flavor.
    pub fn new(namespace: &Arc<Namespace>, raw: &str) -> Self {
        let flavor = namespace.flavor();
        Self::from_parts(namespace, flavor.is_absolute(raw), flavor.split(raw))
    }

    fn from_parts(namespace: &Arc<Namespace>, absolute: bool, parts: Vec<String>) -> Self {
        Self {
            namespace: Arc::clone(namespace),
            absolute,
            parts,
            located: OnceLock::new(),
        }
    }

    /// Child path with a known entry, as produced by directory listings.
    /// `dir` is where the listed directory actually lives.
    fn child_with_entry(&self, dir: &[String], name: &str, entry: EntryRef) -> Self {
        let child = self.join_name(name);
        let mut parts = dir.to_vec();
        parts.push(name.to_string());
        let _ = child.located.set(Located { parts, entry });
        child
    }

    fn join_name(&self, name: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(name.to_string());
        Self::from_parts(&self.namespace, self.absolute, parts)
    }

    /// The namespace this path is bound to.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// The namespace flavor.
    pub fn flavor(&self) -> &Arc<Flavor> {
        self.namespace.flavor()
    }

    /// Components, without separators. `..` is kept until resolution.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Returns true if the path starts at the namespace root.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// `/` for absolute paths, empty otherwise.
    pub fn anchor(&self) -> &'static str {
        if self.absolute { "/" } else { "" }
    }

    fn folded(&self) -> Vec<String> {
        self.flavor().casefold_parts(&self.parts)
    }

    fn same_namespace(&self, other: &VfsPath) -> VfsResult<()> {
        if Arc::ptr_eq(&self.namespace, &other.namespace) {
            Ok(())
        } else {
            Err(VfsError::CrossNamespace {
                left: self.to_string(),
                right: other.to_string(),
            })
        }
    }

    // Component manipulation

    /// Append `other`. An absolute `other` replaces this path.
    pub fn join(&self, other: &str) -> Self {
        let flavor = self.flavor();
        if flavor.is_absolute(other) {
            return Self::new(&self.namespace, other);
        }
        let mut parts = self.parts.clone();
        parts.extend(flavor.split(other));
        Self::from_parts(&self.namespace, self.absolute, parts)
    }

    /// Append another path of the same namespace.
    pub fn join_path(&self, other: &VfsPath) -> VfsResult<Self> {
        self.same_namespace(other)?;
        if other.absolute {
            return Ok(other.clone());
        }
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Ok(Self::from_parts(&self.namespace, self.absolute, parts))
    }

    /// Logical parent. The root (and the empty relative path) is its own parent.
    pub fn parent(&self) -> Self {
        let mut parts = self.parts.clone();
        parts.pop();
        Self::from_parts(&self.namespace, self.absolute, parts)
    }

    /// Logical ancestors, nearest first, ending with the anchor.
    pub fn parents(&self) -> Vec<Self> {
        (0..self.parts.len())
            .rev()
            .map(|n| Self::from_parts(&self.namespace, self.absolute, self.parts[..n].to_vec()))
            .collect()
    }

    /// Final component, or `""` for the root.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Final component's extension, including the dot.
    pub fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(i) if i > 0 && i < name.len() - 1 => &name[i..],
            _ => "",
        }
    }

    /// All extensions of the final component (`.tar`, `.gz`).
    pub fn suffixes(&self) -> Vec<String> {
        let name = self.name();
        if name.ends_with('.') {
            return Vec::new();
        }
        name.trim_start_matches('.')
            .split('.')
            .skip(1)
            .map(|s| format!(".{s}"))
            .collect()
    }

    /// Final component without its suffix.
    pub fn stem(&self) -> &str {
        let name = self.name();
        let suffix = self.suffix();
        &name[..name.len() - suffix.len()]
    }

    /// Replace the final component.
    pub fn with_name(&self, name: &str) -> VfsResult<Self> {
        if self.name().is_empty() {
            return Err(VfsError::invalid_path(format!("{self} has an empty name")));
        }
        let flavor = self.flavor();
        if name.is_empty() || name == "." || name.contains(|c: char| flavor.is_separator(c)) {
            return Err(VfsError::invalid_path(format!("invalid name {name:?}")));
        }
        let mut parts = self.parts.clone();
        if let Some(last) = parts.last_mut() {
            *last = name.to_string();
        }
        Ok(Self::from_parts(&self.namespace, self.absolute, parts))
    }

    /// Replace the stem, keeping the suffix.
    pub fn with_stem(&self, stem: &str) -> VfsResult<Self> {
        self.with_name(&format!("{stem}{}", self.suffix()))
    }

    /// Replace (or with `""` remove) the suffix.
    pub fn with_suffix(&self, suffix: &str) -> VfsResult<Self> {
        let flavor = self.flavor();
        if suffix.contains(|c: char| flavor.is_separator(c))
            || (!suffix.is_empty() && (!suffix.starts_with('.') || suffix == "."))
        {
            return Err(VfsError::invalid_path(format!("invalid suffix {suffix:?}")));
        }
        if self.name().is_empty() {
            return Err(VfsError::invalid_path(format!("{self} has an empty name")));
        }
        self.with_name(&format!("{}{suffix}", self.stem()))
    }

    /// This path relative to `base`.
    pub fn relative_to(&self, base: &VfsPath) -> VfsResult<Self> {
        self.same_namespace(base)?;
        let folded = self.folded();
        if self.absolute != base.absolute || !folded.starts_with(&base.folded()) {
            return Err(VfsError::invalid_path(format!("{self} is not relative to {base}")));
        }
        let rest = self.parts[base.parts.len()..].to_vec();
        Ok(Self::from_parts(&self.namespace, false, rest))
    }

    /// Returns true if [`relative_to`](Self::relative_to) would succeed.
    pub fn is_relative_to(&self, base: &VfsPath) -> bool {
        self.relative_to(base).is_ok()
    }

    // Filesystem access

    /// Backend entry at this path, without following a final symlink.
    ///
    /// Symlinks in the intermediate components are followed and `..` is
    /// applied after them, so `/app/../data` with `/app -> /var/lib/app`
    /// finds `/var/lib/data`.
    pub fn get(&self) -> VfsResult<EntryRef> {
        Ok(Arc::clone(&self.located()?.entry))
    }

    fn located(&self) -> VfsResult<&Located> {
        if let Some(located) = self.located.get() {
            return Ok(located);
        }
        let located = self.locate()?;
        Ok(self.located.get_or_init(|| located))
    }

    fn locate(&self) -> VfsResult<Located> {
        let has_dotdot = self.parts.iter().any(|p| p == "..");
        if !has_dotdot {
            // Backends never cross a symlink, so a direct hit has none in
            // its intermediate components.
            match self.namespace.get_parts(&self.parts) {
                Ok(entry) => {
                    return Ok(Located {
                        parts: self.parts.clone(),
                        entry,
                    });
                }
                Err(VfsError::NotFound(_) | VfsError::NotADirectory(_))
                    if !self.parts.is_empty() => {}
                Err(e) => return Err(e),
            }
        }

        let parts = match self.parts.last() {
            None => Vec::new(),
            Some(name) if name == ".." => self.resolve(true)?.parts,
            Some(name) => {
                let mut parts = self.parent().resolve(true)?.parts;
                parts.push(name.clone());
                parts
            }
        };
        let entry = self.namespace.get_parts(&parts)?;
        Ok(Located { parts, entry })
    }

    /// Absolute path in this namespace made of `parts`.
    fn rooted(&self, parts: Vec<String>) -> Self {
        Self::from_parts(&self.namespace, true, parts)
    }

    /// Entry with symlinks followed, along with the path it was found at.
    fn followed(&self) -> VfsResult<(VfsPath, EntryRef)> {
        let located = self.located()?;
        if !located.entry.is_symlink() {
            return Ok((self.rooted(located.parts.clone()), Arc::clone(&located.entry)));
        }
        let target = self.resolve(true)?;
        let entry = target.get()?;
        Ok((target, entry))
    }

    /// Canonical path with every symlink resolved and `..` collapsed.
    ///
    /// With `strict`, failures to read a component propagate; otherwise the
    /// unreadable remainder is kept literally. Symlink cycles always fail.
    pub fn resolve(&self, strict: bool) -> VfsResult<Self> {
        let resolved = resolve_str(&self.namespace, &self.to_string(), strict)?;
        let resolved = if resolved.is_empty() {
            let literal = collapse_dotdot(self.parts.clone(), true);
            self.namespace.get_parts(&literal)?;
            format!("{SEP}{}", literal.join("/"))
        } else {
            resolved
        };
        let normed = self.flavor().normpath(&resolved);
        Ok(Self::new(&self.namespace, &normed))
    }

    /// Open the file, following symlinks.
    pub fn open(&self) -> VfsResult<Box<dyn ReadSeek>> {
        self.followed()?.1.open()
    }

    /// Whole file contents.
    pub fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Whole file contents as UTF-8.
    pub fn read_text(&self) -> VfsResult<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| VfsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Stat record, following symlinks.
    pub fn stat(&self) -> VfsResult<StatRecord> {
        self.stat_with(true)
    }

    /// Stat record of the path itself, never following a final symlink.
    pub fn lstat(&self) -> VfsResult<StatRecord> {
        self.stat_with(false)
    }

    /// Stat record, following symlinks only if `follow_symlinks`.
    ///
    /// The pseudo-inode is derived from the path that was actually stat'd,
    /// so a followed link reports its target's address.
    pub fn stat_with(&self, follow_symlinks: bool) -> VfsResult<StatRecord> {
        let (path, entry) = if follow_symlinks {
            self.followed()?
        } else {
            let located = self.located()?;
            (self.rooted(located.parts.clone()), Arc::clone(&located.entry))
        };
        stat_of(
            &path.to_string(),
            entry.as_ref(),
            self.flavor(),
            self.namespace.id().device(),
        )
    }

    /// Target of a symlink, as a path in the same namespace.
    pub fn readlink(&self) -> VfsResult<Self> {
        let target = self.get()?.read_link()?;
        Ok(Self::new(&self.namespace, &target))
    }

    /// Directory listing with entries, in backend order.
    ///
    /// Every call asks the backend again.
    pub fn scandir(&self) -> VfsResult<ScanDir> {
        let (dir, entry) = self.followed()?;
        if !entry.is_dir() {
            return Err(VfsError::not_a_directory(self.to_string()));
        }
        Ok(ScanDir {
            parent: self.clone(),
            dir: dir.parts,
            children: entry.list_children()?.into_iter(),
        })
    }

    /// Child paths, in backend order. `.` and `..` are never yielded.
    pub fn iterdir(&self) -> VfsResult<impl Iterator<Item = VfsPath> + use<>> {
        Ok(self.scandir()?.map(DirEntry::into_path))
    }

    /// Child names, in backend order.
    pub fn listdir(&self) -> VfsResult<Vec<String>> {
        Ok(self.scandir()?.map(|e| e.name).collect())
    }

    /// Returns true if the path (after following symlinks) exists.
    pub fn exists(&self) -> bool {
        self.followed().is_ok()
    }

    /// Returns true if the path is, or links to, a directory.
    pub fn is_dir(&self) -> bool {
        self.followed().is_ok_and(|(_, e)| e.is_dir())
    }

    /// Returns true if the path is, or links to, a regular file.
    pub fn is_file(&self) -> bool {
        self.followed().is_ok_and(|(_, e)| e.is_file())
    }

    /// Returns true if the path itself is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.get().is_ok_and(|e| e.is_symlink())
    }

    /// Returns true if both paths stat to the same node.
    pub fn samefile(&self, other: &VfsPath) -> VfsResult<bool> {
        let a = self.stat()?;
        let b = other.stat()?;
        Ok(a.ino == b.ino && a.dev == b.dev)
    }

    // Operations with no meaning in a read-only evidence namespace

    /// There is no current directory inside evidence.
    pub fn cwd(_namespace: &Arc<Namespace>) -> VfsResult<Self> {
        Err(VfsError::unsupported("cwd"))
    }

    /// There are no home directories inside evidence.
    pub fn home(_namespace: &Arc<Namespace>) -> VfsResult<Self> {
        Err(VfsError::unsupported("home"))
    }

    /// Use [`resolve`](Self::resolve) instead.
    pub fn absolute(&self) -> VfsResult<Self> {
        Err(VfsError::unsupported("absolute"))
    }

    /// There is no `~` to expand inside evidence.
    pub fn expanduser(&self) -> VfsResult<Self> {
        Err(VfsError::unsupported("expanduser"))
    }

    /// Evidence is read-only.
    pub fn mkdir(&self, _mode: u32, _parents: bool, _exist_ok: bool) -> VfsResult<()> {
        Err(VfsError::unsupported("mkdir"))
    }

    /// Evidence is read-only.
    pub fn touch(&self, _mode: u32, _exist_ok: bool) -> VfsResult<()> {
        Err(VfsError::unsupported("touch"))
    }

    /// Evidence is read-only.
    pub fn unlink(&self, _missing_ok: bool) -> VfsResult<()> {
        Err(VfsError::unsupported("unlink"))
    }

    /// Evidence is read-only.
    pub fn rmdir(&self) -> VfsResult<()> {
        Err(VfsError::unsupported("rmdir"))
    }

    /// Evidence is read-only.
    pub fn rename(&self, _target: &str) -> VfsResult<Self> {
        Err(VfsError::unsupported("rename"))
    }

    /// Evidence is read-only.
    pub fn replace(&self, _target: &str) -> VfsResult<Self> {
        Err(VfsError::unsupported("replace"))
    }

    /// Links can only be read, never created.
    pub fn symlink_to(&self, _target: &str) -> VfsResult<()> {
        Err(VfsError::unsupported("symlink_to"))
    }

    /// Links can only be read, never created.
    pub fn hardlink_to(&self, _target: &str) -> VfsResult<()> {
        Err(VfsError::unsupported("hardlink_to"))
    }

    /// Permissions are synthesized and can't be changed.
    pub fn chmod(&self, _mode: u32) -> VfsResult<()> {
        Err(VfsError::unsupported("chmod"))
    }

    /// Permissions are synthesized and can't be changed.
    pub fn lchmod(&self, _mode: u32) -> VfsResult<()> {
        Err(VfsError::unsupported("lchmod"))
    }

    /// Ownership is never known.
    pub fn owner(&self) -> VfsResult<String> {
        Err(VfsError::unsupported("owner"))
    }

    /// Ownership is never known.
    pub fn group(&self) -> VfsResult<String> {
        Err(VfsError::unsupported("group"))
    }

    /// Timestamps are evidence; they are never rewritten.
    pub fn utime(&self, _times: Timestamps) -> VfsResult<()> {
        Err(VfsError::unsupported("utime"))
    }

    /// Evidence is read-only.
    pub fn write_bytes(&self, _data: &[u8]) -> VfsResult<usize> {
        Err(VfsError::unsupported("write_bytes"))
    }

    /// Evidence is read-only.
    pub fn write_text(&self, _data: &str) -> VfsResult<usize> {
        Err(VfsError::unsupported("write_text"))
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.parts.join("/");
        if self.absolute {
            write!(f, "{SEP}{joined}")
        } else if joined.is_empty() {
            f.write_str(".")
        } else {
            f.write_str(&joined)
        }
    }
}

impl fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VfsPath({:?})", self.to_string())
    }
}

impl PartialEq for VfsPath {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.namespace, &other.namespace)
            && self.absolute == other.absolute
            && self.folded() == other.folded()
    }
}

impl Eq for VfsPath {}

impl Hash for VfsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute.hash(state);
        self.folded().hash(state);
    }
}

/// Paths of different namespaces are unordered.
impl PartialOrd for VfsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !Arc::ptr_eq(&self.namespace, &other.namespace) {
            return None;
        }
        Some(
            self.absolute
                .cmp(&other.absolute)
                .then_with(|| self.folded().cmp(&other.folded())),
        )
    }
}

/// One child yielded by [`VfsPath::scandir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    name: String,
    path: VfsPath,
    entry: EntryRef,
}

impl DirEntry {
    /// Name as reported by the backend.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the child.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Take the child path, keeping its cached entry.
    pub fn into_path(self) -> VfsPath {
        self.path
    }

    /// Backend entry of the child itself (links not followed).
    pub fn entry(&self) -> &EntryRef {
        &self.entry
    }

    /// Returns true if the child itself is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.entry.is_symlink()
    }

    /// Directory check; a dangling or unreadable link is not a directory.
    pub fn is_dir(&self, follow_symlinks: bool) -> bool {
        if follow_symlinks && self.entry.is_symlink() {
            self.path.is_dir()
        } else {
            self.entry.is_dir()
        }
    }

    /// Regular-file check; a dangling or unreadable link is not a file.
    pub fn is_file(&self, follow_symlinks: bool) -> bool {
        if follow_symlinks && self.entry.is_symlink() {
            self.path.is_file()
        } else {
            self.entry.is_file()
        }
    }

    /// Stat record of the child, following a final symlink if asked.
    pub fn stat(&self, follow_symlinks: bool) -> VfsResult<StatRecord> {
        self.path.stat_with(follow_symlinks)
    }
}

/// Iterator returned by [`VfsPath::scandir`].
pub struct ScanDir {
    parent: VfsPath,
    dir: Vec<String>,
    children: IntoIter<String, EntryRef>,
}

impl Iterator for ScanDir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        for (name, entry) in self.children.by_ref() {
            if name == "." || name == ".." {
                continue;
            }
            let path = self.parent.child_with_entry(&self.dir, &name, Arc::clone(&entry));
            return Some(DirEntry { name, path, entry });
        }
        None
    }
}
