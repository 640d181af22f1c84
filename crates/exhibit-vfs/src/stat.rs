//! Pseudo-inode addresses and stat records.
//!
//! Backends have no inode numbers we could trust across containers, so the
//! address of an entry is a BLAKE3 hash of its normalized namespace path and
//! the flavor that normalized it. The same logical path always gets the same
//! address, no matter which backend serves it or how often it is remounted.

use crate::error::VfsResult;
use crate::flavor::{Flavor, SEP};
use crate::ops::BackendEntry;
use crate::types::{StatRecord, S_IFDIR, S_IFREG};

/// Permission bits reported for every entry.
pub const DEFAULT_PERMISSIONS: u32 = 0o755;

/// Stable 64-bit address for a namespace path.
///
/// The path is anchored at the root, `.`/`..`-normalized and case-folded per
/// `flavor` before hashing.
pub fn generate_addr(path: &str, flavor: &Flavor) -> u64 {
    let anchored = format!("{SEP}{path}");
    let normalized = flavor.normpath(&anchored);
    let folded = flavor.casefold(&normalized);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&[u8::from(flavor.case_sensitive())]);
    if let Some(alt) = flavor.alt_separator() {
        hasher.update(alt.encode_utf8(&mut [0; 4]).as_bytes());
    }
    hasher.update(&[0]);
    hasher.update(folded.as_bytes());

    let mut addr = [0u8; 8];
    addr.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(addr)
}

/// Synthesize a stat record for `entry`, reached at namespace path `path`.
///
/// Directories get `S_IFDIR` and size 0; everything else is reported as a
/// regular file with the backend's size. Symlinks are never stat'd natively
/// here: callers that follow links pass the target's entry instead.
pub fn stat_of(path: &str, entry: &dyn BackendEntry, flavor: &Flavor, dev: u64) -> VfsResult<StatRecord> {
    let (kind, size) = if entry.is_dir() {
        (S_IFDIR, 0)
    } else {
        (S_IFREG, entry.size()?)
    };
    let times = entry.times();

    Ok(StatRecord {
        mode: kind | DEFAULT_PERMISSIONS,
        ino: generate_addr(path, flavor),
        dev,
        nlink: 1,
        uid: 0,
        gid: 0,
        size,
        atime: times.atime,
        mtime: times.mtime,
        ctime: times.ctime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::ops::FilesystemBackend;

    #[test]
    fn test_addr_is_stable() {
        let f = Flavor::new(true, None);
        assert_eq!(generate_addr("/a/b", &f), generate_addr("/a/b", &f));
    }

    #[test]
    fn test_addr_normalizes() {
        let f = Flavor::new(true, Some('\\'));
        let addr = generate_addr("/a/b", &f);
        assert_eq!(addr, generate_addr("a/b", &f));
        assert_eq!(addr, generate_addr("/a/./c/../b/", &f));
        assert_eq!(addr, generate_addr("\\a\\b", &f));
    }

    #[test]
    fn test_addr_distinct_paths() {
        let f = Flavor::new(true, None);
        let addrs: std::collections::HashSet<u64> = (0..1000)
            .map(|i| generate_addr(&format!("/dir/file{i}"), &f))
            .collect();
        assert_eq!(addrs.len(), 1000);
    }

    #[test]
    fn test_addr_case_rule() {
        let insensitive = Flavor::new(false, None);
        assert_eq!(
            generate_addr("/Windows/System32", &insensitive),
            generate_addr("/windows/system32", &insensitive)
        );

        let sensitive = Flavor::new(true, None);
        assert_ne!(
            generate_addr("/Windows/System32", &sensitive),
            generate_addr("/windows/system32", &sensitive)
        );
    }

    #[test]
    fn test_stat_of_file_and_dir() {
        let fs = MemoryBackend::new(true);
        fs.map_file("dir/file.txt", b"hello".to_vec()).unwrap();
        let f = Flavor::new(true, None);

        let file = fs.lookup("dir/file.txt").unwrap();
        let st = stat_of("/dir/file.txt", file.as_ref(), &f, 7).unwrap();
        assert!(st.is_file());
        assert_eq!(st.size, 5);
        assert_eq!(st.dev, 7);
        assert_eq!(st.nlink, 1);
        assert_eq!((st.uid, st.gid), (0, 0));

        let dir = fs.lookup("dir").unwrap();
        let st = stat_of("/dir", dir.as_ref(), &f, 7).unwrap();
        assert!(st.is_dir());
        assert_eq!(st.size, 0);
    }
}
