//! Namespace mount table with longest-prefix routing.
//!
//! A [`Namespace`] composes backends into one tree. Mount points are matched
//! component-wise by longest prefix: with `c:` and `c:/users/alice` both
//! mounted, `c:/users/alice/ntuser.dat` goes to the second one. Backends that
//! were never given a name are reachable as anonymous roots,
//! `<prefix>/<index>/...` (`$fs$/0/...` by default).
//!
//! The root, and every directory that only exists because a mount point sits
//! below it, is synthesized: its listing merges the mounted backend's own
//! children (if any) with the next component of each mount underneath.
//! Mounts shadow backend entries with the same name.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::config::NamespaceConfig;
use crate::error::{VfsError, VfsResult};
use crate::flavor::{collapse_dotdot, Flavor, SEP};
use crate::ops::{BackendEntry, Children, EntryRef, FilesystemBackend, ReadSeek};
use crate::path::VfsPath;
use crate::types::{NamespaceId, Timestamps};

/// Information about a mount point.
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// Normalized mount-point name (e.g. `c:`, `sysvol/efi`); `/` for a root
    /// mount.
    pub name: String,
    /// The mounted backend.
    pub backend: Arc<dyn FilesystemBackend>,
}

#[derive(Debug)]
struct MountPoint {
    name: String,
    parts: Vec<String>,
    folded: Vec<String>,
    backend: Arc<dyn FilesystemBackend>,
}

#[derive(Debug, Default)]
struct MountTable {
    /// Keyed by the folded, `/`-joined mount name.
    mounts: IndexMap<String, MountPoint>,
    anonymous: Vec<Arc<dyn FilesystemBackend>>,
}

/// Where a lookup lands, decided under the read lock.
struct Route {
    /// Longest matching mount: components consumed and the backend.
    target: Option<(usize, String, Arc<dyn FilesystemBackend>)>,
    /// Next component of each mount strictly below the path, as mounted.
    overlay: Vec<String>,
}

/// A composed view over one or more backends.
///
/// Mounting is a setup-phase operation; after that the namespace is read from
/// any number of threads. Each analysis session owns its own instance.
pub struct Namespace {
    id: NamespaceId,
    flavor: Arc<Flavor>,
    anonymous_prefix: String,
    table: RwLock<MountTable>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("flavor", &self.flavor)
            .field("mounts", &"<locked>")
            .finish()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::from_valid(NamespaceConfig::default())
    }
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new(config: NamespaceConfig) -> VfsResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: NamespaceConfig) -> Self {
        Self {
            id: NamespaceId::new(),
            flavor: config.flavor(),
            anonymous_prefix: config.anonymous_prefix,
            table: RwLock::new(MountTable::default()),
        }
    }

    /// Namespace identity.
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Path dialect shared by every path in this namespace.
    pub fn flavor(&self) -> &Arc<Flavor> {
        &self.flavor
    }

    /// First component of anonymous roots.
    pub fn anonymous_prefix(&self) -> &str {
        &self.anonymous_prefix
    }

    /// Build a path bound to this namespace.
    pub fn path(self: &Arc<Self>, raw: &str) -> VfsPath {
        VfsPath::new(self, raw)
    }

    /// The namespace root.
    pub fn root(self: &Arc<Self>) -> VfsPath {
        VfsPath::new(self, "/")
    }

    /// Mount `backend` under `name`.
    ///
    /// `name` is normalized like any path (`c:`, `/c:/`, `C:` with a
    /// case-insensitive flavor all name the same mount point); `/` mounts at
    /// the root. Fails with `MountExists` if the name is taken.
    pub fn mount(&self, name: &str, backend: Arc<dyn FilesystemBackend>) -> VfsResult<()> {
        let parts = collapse_dotdot(self.flavor.split(name), true);
        let folded = self.flavor.casefold_parts(&parts);
        let key = folded.join("/");
        let shown = display_name(&parts);

        let mut table = self.table.write();
        if table.mounts.contains_key(&key) {
            return Err(VfsError::MountExists(shown));
        }
        debug!(
            namespace = %self.id.short(),
            mount = %shown,
            backend = backend.kind(),
            "mounted"
        );
        table.mounts.insert(
            key,
            MountPoint {
                name: shown,
                parts,
                folded,
                backend,
            },
        );
        Ok(())
    }

    /// Remove the mount at `name`.
    ///
    /// Returns `true` if a mount was removed, `false` if nothing was mounted there.
    pub fn unmount(&self, name: &str) -> bool {
        let parts = collapse_dotdot(self.flavor.split(name), true);
        let key = self.flavor.casefold_parts(&parts).join("/");
        let removed = self.table.write().mounts.shift_remove(&key).is_some();
        if removed {
            debug!(namespace = %self.id.short(), mount = %display_name(&parts), "unmounted");
        }
        removed
    }

    /// Register a backend that has no mount-point name.
    ///
    /// Returns its index; the backend is reachable at `<prefix>/<index>`.
    pub fn add_anonymous(&self, backend: Arc<dyn FilesystemBackend>) -> usize {
        let mut table = self.table.write();
        let index = table.anonymous.len();
        debug!(
            namespace = %self.id.short(),
            index,
            backend = backend.kind(),
            "registered anonymous root"
        );
        table.anonymous.push(backend);
        index
    }

    /// Current mounts, in mount order.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.table
            .read()
            .mounts
            .values()
            .map(|m| MountInfo {
                name: m.name.clone(),
                backend: Arc::clone(&m.backend),
            })
            .collect()
    }

    /// Anonymous backends, in index order.
    pub fn anonymous(&self) -> Vec<Arc<dyn FilesystemBackend>> {
        self.table.read().anonymous.clone()
    }

    /// Look up the entry at `path`.
    ///
    /// `.` and `..` are collapsed lexically and no symlink is followed, not
    /// even in intermediate components. [`VfsPath::get`] does that.
    pub fn get(&self, path: &str) -> VfsResult<EntryRef> {
        let parts = collapse_dotdot(self.flavor.split(path), true);
        self.get_parts(&parts)
    }

    pub(crate) fn get_parts(&self, parts: &[String]) -> VfsResult<EntryRef> {
        let route = self.route(parts);
        let label = format!("{SEP}{}", parts.join("/"));

        let base = match &route.target {
            Some((consumed, mount, backend)) => {
                let rest = &parts[*consumed..];
                trace!(path = %label, mount = %mount, backend = backend.kind(), "dispatch");
                Some(self.lookup_in(backend.as_ref(), rest))
            }
            None => None,
        };

        if route.overlay.is_empty() {
            return match base {
                Some(result) => result,
                None if parts.is_empty() => Ok(Arc::new(SyntheticDir {
                    path: label,
                    flavor: Arc::clone(&self.flavor),
                    base: None,
                    overlay: Vec::new(),
                })),
                None => Err(VfsError::not_found(label)),
            };
        }

        let base = match base {
            Some(Ok(entry)) if entry.is_dir() => Some(entry),
            Some(Ok(_)) | None => None,
            Some(Err(e)) if e.is_not_found() => None,
            Some(Err(e)) => return Err(e),
        };

        let mut overlay = Vec::with_capacity(route.overlay.len());
        for name in route.overlay {
            let mut below = parts.to_vec();
            below.push(name.clone());
            overlay.push((name, self.get_parts(&below)?));
        }

        Ok(Arc::new(SyntheticDir {
            path: label,
            flavor: Arc::clone(&self.flavor),
            base,
            overlay,
        }))
    }

    /// Pick the longest mount covering `parts` and collect mounts below it.
    fn route(&self, parts: &[String]) -> Route {
        let folded = self.flavor.casefold_parts(parts);
        let table = self.table.read();

        let prefix = self.flavor.casefold(&self.anonymous_prefix).into_owned();
        let anonymous = table.anonymous.iter().enumerate().map(|(i, backend)| {
            (
                vec![prefix.clone(), i.to_string()],
                vec![self.anonymous_prefix.clone(), i.to_string()],
                format!("{}/{i}", self.anonymous_prefix),
                backend,
            )
        });
        let named = table
            .mounts
            .values()
            .map(|m| (m.folded.clone(), m.parts.clone(), m.name.clone(), &m.backend));

        let mut target: Option<(usize, String, Arc<dyn FilesystemBackend>)> = None;
        let mut overlay: Vec<String> = Vec::new();
        let mut overlay_keys: Vec<String> = Vec::new();

        for (mount_folded, mount_parts, name, backend) in named.chain(anonymous) {
            if mount_folded.len() <= folded.len() {
                if folded.starts_with(&mount_folded)
                    && target.as_ref().is_none_or(|(len, ..)| mount_folded.len() > *len)
                {
                    target = Some((mount_folded.len(), name, Arc::clone(backend)));
                }
            } else if mount_folded.starts_with(&folded) {
                let key = &mount_folded[folded.len()];
                if !overlay_keys.contains(key) {
                    overlay_keys.push(key.clone());
                    overlay.push(mount_parts[folded.len()].clone());
                }
            }
        }

        Route { target, overlay }
    }

    /// Look `rest` up inside one backend.
    ///
    /// A case-insensitive namespace over a case-sensitive backend still
    /// matches names case-insensitively: components the backend doesn't find
    /// verbatim are matched against the folded directory listing.
    fn lookup_in(&self, backend: &dyn FilesystemBackend, rest: &[String]) -> VfsResult<EntryRef> {
        if self.flavor.case_sensitive() || !backend.case_sensitive() {
            return backend.lookup(&rest.join("/"));
        }

        let mut current = backend.lookup("")?;
        for part in rest {
            current = match current.child(part) {
                Ok(entry) => entry,
                Err(e) if e.is_not_found() => {
                    let want = self.flavor.casefold(part);
                    current
                        .list_children()?
                        .into_iter()
                        .find(|(name, _)| self.flavor.casefold(name) == want)
                        .map(|(_, entry)| entry)
                        .ok_or(e)?
                }
                Err(e) => return Err(e),
            };
        }
        Ok(current)
    }
}

fn display_name(parts: &[String]) -> String {
    if parts.is_empty() {
        SEP.to_string()
    } else {
        parts.join("/")
    }
}

/// A namespace can itself be mounted inside another namespace.
impl FilesystemBackend for Namespace {
    fn lookup(&self, path: &str) -> VfsResult<EntryRef> {
        self.get(path)
    }

    fn kind(&self) -> &'static str {
        "namespace"
    }

    fn case_sensitive(&self) -> bool {
        self.flavor.case_sensitive()
    }
}

/// Directory that exists because mount points live below it.
#[derive(Debug)]
struct SyntheticDir {
    path: String,
    flavor: Arc<Flavor>,
    /// The backend's own directory at this path, if there is one.
    base: Option<EntryRef>,
    overlay: Vec<(String, EntryRef)>,
}

impl BackendEntry for SyntheticDir {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn is_file(&self) -> bool {
        false
    }

    fn list_children(&self) -> VfsResult<Children> {
        let mut children = match &self.base {
            Some(base) => base.list_children()?,
            None => Children::new(),
        };
        for (name, entry) in &self.overlay {
            let folded = self.flavor.casefold(name);
            children.retain(|existing, _| self.flavor.casefold(existing) != folded);
            children.insert(name.clone(), Arc::clone(entry));
        }
        Ok(children)
    }

    fn child(&self, name: &str) -> VfsResult<EntryRef> {
        let folded = self.flavor.casefold(name);
        if let Some((_, entry)) = self
            .overlay
            .iter()
            .find(|(mounted, _)| self.flavor.casefold(mounted) == folded)
        {
            return Ok(Arc::clone(entry));
        }
        match &self.base {
            Some(base) => base.child(name),
            None => Err(VfsError::not_found(format!(
                "{}/{name}",
                self.path.trim_end_matches(SEP)
            ))),
        }
    }

    fn open(&self) -> VfsResult<Box<dyn ReadSeek>> {
        Err(VfsError::is_a_directory(&self.path))
    }

    fn size(&self) -> VfsResult<u64> {
        Ok(0)
    }

    fn times(&self) -> Timestamps {
        self.base.as_ref().map(|b| b.times()).unwrap_or_default()
    }
}
