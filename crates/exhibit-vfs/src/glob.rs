//! Glob matching over namespace paths.
//!
//! Patterns are split into components and matched one level at a time:
//! literal components are looked up directly, components with `*`, `?` or
//! `[...]` are matched against directory listings, and `**` expands to the
//! directory itself plus every directory below it. Matching honors the
//! namespace case rule. Unreadable directories are skipped.

use indexmap::IndexSet;

use crate::error::{VfsError, VfsResult};
use crate::flavor::has_magic;
use crate::path::VfsPath;

const RECURSIVE: &str = "**";

impl VfsPath {
    /// Returns true if the path matches `pattern`, anchored on the right.
    ///
    /// A relative pattern matches the trailing components (`*.evtx` matches
    /// `/Windows/Logs/System.evtx`); an absolute one must match the whole
    /// path.
    pub fn matches(&self, pattern: &str) -> VfsResult<bool> {
        let flavor = self.flavor();
        let pattern_parts = flavor.split(pattern);
        if pattern_parts.is_empty() {
            return Err(VfsError::InvalidPattern("empty pattern".to_string()));
        }

        if flavor.is_absolute(pattern) {
            if !self.is_absolute() || pattern_parts.len() != self.parts().len() {
                return Ok(false);
            }
        } else if pattern_parts.len() > self.parts().len() {
            return Ok(false);
        }

        for (part, pat) in self.parts().iter().rev().zip(pattern_parts.iter().rev()) {
            if !flavor.compile_pattern(pat)?.is_match(part) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Paths below this directory matching a relative `pattern`.
    ///
    /// Results come in traversal order without duplicates.
    pub fn glob(&self, pattern: &str) -> VfsResult<Vec<VfsPath>> {
        let flavor = self.flavor();
        if flavor.is_absolute(pattern) {
            return Err(VfsError::InvalidPattern(format!(
                "non-relative patterns are unsupported: {pattern}"
            )));
        }
        let mut parts = flavor.split(pattern);
        if parts.is_empty() {
            return Err(VfsError::InvalidPattern(format!("unacceptable pattern: {pattern:?}")));
        }
        parts.dedup_by(|a, b| *a == RECURSIVE && *b == RECURSIVE);

        let mut current: IndexSet<VfsPath> = IndexSet::from([self.clone()]);
        let last = parts.len() - 1;
        for (i, part) in parts.iter().enumerate() {
            let is_last = i == last;
            let mut next = IndexSet::new();
            for path in &current {
                if part == RECURSIVE {
                    next.extend(path.walk().map(|entry| entry.path));
                } else if has_magic(part) {
                    select_wildcard(path, part, is_last, &mut next)?;
                } else {
                    let child = path.join(part);
                    if (is_last && child.exists()) || child.is_dir() {
                        next.insert(child);
                    }
                }
            }
            current = next;
        }
        Ok(current.into_iter().collect())
    }

    /// [`glob`](Self::glob) with `**/` prepended to `pattern`.
    pub fn rglob(&self, pattern: &str) -> VfsResult<Vec<VfsPath>> {
        self.glob(&format!("{RECURSIVE}/{pattern}"))
    }
}

/// Children of `dir` whose names match `pattern`; only directories unless
/// this is the final component.
fn select_wildcard(
    dir: &VfsPath,
    pattern: &str,
    is_last: bool,
    out: &mut IndexSet<VfsPath>,
) -> VfsResult<()> {
    let matcher = dir.flavor().compile_pattern(pattern)?;
    let Ok(listing) = dir.scandir() else {
        return Ok(());
    };
    for child in listing {
        if matcher.is_match(child.name()) && (is_last || child.is_dir(true)) {
            out.insert(child.into_path());
        }
    }
    Ok(())
}
