//! Symlink resolution.
//!
//! Walks a path left to right against the namespace, replacing every
//! component that is a symlink with its (recursively resolved) target. `..`
//! is applied to the string resolved so far, so it steps out of a link's
//! target rather than out of the link.
//!
//! Each call gets its own memo of link paths: `None` while a link is being
//! resolved, `Some(target)` once it's done. Meeting a `None` again means the
//! walk came back to a link it is still inside of, which is a cycle.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{VfsError, VfsResult};
use crate::flavor::SEP;
use crate::mount::Namespace;

/// Resolve `path` to a string with no symlink components.
///
/// Returns the empty string when the walk ends at the root. Relative paths are
/// resolved from the root. `..` segments that came from link targets may
/// remain; callers normalize the result.
pub(crate) fn resolve_str(namespace: &Namespace, path: &str, strict: bool) -> VfsResult<String> {
    let mut resolver = Resolver {
        namespace,
        strict,
        seen: HashMap::new(),
    };
    resolver.resolve(String::new(), path)
}

struct Resolver<'a> {
    namespace: &'a Namespace,
    strict: bool,
    /// Keyed by the case-folded link path.
    seen: HashMap<String, Option<String>>,
}

impl Resolver<'_> {
    fn resolve(&mut self, mut path: String, rest: &str) -> VfsResult<String> {
        let namespace = self.namespace;
        let flavor = namespace.flavor();
        let rest = flavor.to_primary(rest);
        if rest.starts_with(SEP) {
            path.clear();
        }

        for name in rest.split(SEP) {
            if name.is_empty() || name == "." {
                continue;
            }
            if name == ".." {
                let cut = path.rfind(SEP).unwrap_or(0);
                path.truncate(cut);
                continue;
            }

            let candidate = if path.ends_with(SEP) {
                format!("{path}{name}")
            } else {
                format!("{path}{SEP}{name}")
            };
            let key = flavor.casefold(&candidate).into_owned();

            match self.seen.get(&key) {
                Some(Some(resolved)) => {
                    path = resolved.clone();
                    continue;
                }
                Some(None) => {
                    debug!(path = %candidate, "symlink cycle");
                    return Err(VfsError::symlink_recursion(candidate));
                }
                None => {}
            }

            match namespace.get(&candidate).and_then(|entry| entry.read_link()) {
                Ok(target) => {
                    trace!(link = %candidate, target = %target, "following symlink");
                    self.seen.insert(key.clone(), None);
                    path = self.resolve(path, &target)?;
                    self.seen.insert(key, Some(path.clone()));
                }
                Err(VfsError::NotASymlink(_)) => path = candidate,
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    trace!(path = %candidate, error = %e, "kept literally");
                    path = candidate;
                }
            }
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::config::NamespaceConfig;
    use std::sync::Arc;

    fn namespace(setup: impl FnOnce(&MemoryBackend)) -> Arc<Namespace> {
        let fs = MemoryBackend::new(true);
        setup(&fs);
        let ns = Arc::new(Namespace::new(NamespaceConfig::case_sensitive()).unwrap());
        ns.mount("/", Arc::new(fs)).unwrap();
        ns
    }

    #[test]
    fn test_plain_path() {
        let ns = namespace(|fs| fs.map_file("a/b", b"x".to_vec()).unwrap());
        assert_eq!(resolve_str(&ns, "/a/b", true).unwrap(), "/a/b");
        assert_eq!(resolve_str(&ns, "a/./b", true).unwrap(), "/a/b");
        assert_eq!(resolve_str(&ns, "/", true).unwrap(), "");
    }

    #[test]
    fn test_relative_target() {
        let ns = namespace(|fs| {
            fs.map_file("etc/real.conf", b"x".to_vec()).unwrap();
            fs.symlink("etc/link.conf", "real.conf").unwrap();
        });
        assert_eq!(resolve_str(&ns, "/etc/link.conf", true).unwrap(), "/etc/real.conf");
    }

    #[test]
    fn test_absolute_target_resets() {
        let ns = namespace(|fs| {
            fs.map_file("usr/lib/libc.so", b"x".to_vec()).unwrap();
            fs.symlink("lib", "/usr/lib").unwrap();
        });
        assert_eq!(resolve_str(&ns, "/lib/libc.so", true).unwrap(), "/usr/lib/libc.so");
    }

    #[test]
    fn test_dotdot_after_link() {
        let ns = namespace(|fs| {
            fs.map_dir("var/lib/app").unwrap();
            fs.map_file("var/lib/data", b"x".to_vec()).unwrap();
            fs.symlink("app", "/var/lib/app").unwrap();
        });
        assert_eq!(resolve_str(&ns, "/app/../data", true).unwrap(), "/var/lib/data");
    }

    #[test]
    fn test_chained_links() {
        let ns = namespace(|fs| {
            fs.map_file("target", b"x".to_vec()).unwrap();
            fs.symlink("one", "two").unwrap();
            fs.symlink("two", "/three").unwrap();
            fs.symlink("three", "./target").unwrap();
        });
        assert_eq!(resolve_str(&ns, "/one", true).unwrap(), "/target");
    }

    #[test]
    fn test_cycle() {
        let ns = namespace(|fs| {
            fs.symlink("a", "/b").unwrap();
            fs.symlink("b", "/a").unwrap();
        });
        assert!(matches!(resolve_str(&ns, "/a", false), Err(VfsError::SymlinkRecursion(_))));
        assert!(matches!(resolve_str(&ns, "/a", true), Err(VfsError::SymlinkRecursion(_))));
    }

    #[test]
    fn test_self_loop() {
        let ns = namespace(|fs| fs.symlink("loop", "loop").unwrap());
        assert!(matches!(resolve_str(&ns, "/loop", false), Err(VfsError::SymlinkRecursion(_))));
    }

    #[test]
    fn test_memoized_link_is_not_a_cycle() {
        let ns = namespace(|fs| {
            fs.map_dir("real").unwrap();
            fs.symlink("link", "/real").unwrap();
        });
        assert_eq!(resolve_str(&ns, "/link/../link", true).unwrap(), "/real");
    }

    #[test]
    fn test_missing_strict_and_lenient() {
        let ns = namespace(|_| {});
        assert_eq!(
            resolve_str(&ns, "/missing/../also_missing", false).unwrap(),
            "/also_missing"
        );
        assert!(resolve_str(&ns, "/missing", true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_alt_separator_in_target() {
        let fs = MemoryBackend::new(false);
        fs.map_file("Windows/System32/drivers/etc/hosts", b"x".to_vec()).unwrap();
        fs.symlink("etc", "\\Windows\\System32\\drivers\\etc").unwrap();
        let ns = Arc::new(Namespace::new(NamespaceConfig::default().with_alt_separator('\\')).unwrap());
        ns.mount("/", Arc::new(fs)).unwrap();

        assert_eq!(
            resolve_str(&ns, "/etc/hosts", true).unwrap(),
            "/Windows/System32/drivers/etc/hosts"
        );
    }
}
