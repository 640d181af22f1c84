//! Recursive directory walk.
//!
//! [`Walk`] is an iterator over `(path, dirnames, filenames)` triples driven
//! by an explicit stack. Top-down walks emit a directory as soon as it's
//! listed; bottom-up walks park the triple on the stack under the
//! directory's children and emit it once they're done.
//!
//! A directory that can't be listed is reported to the `on_error` handler
//! (if any) and skipped; the rest of the tree is still visited.

use std::fmt;

use crate::error::VfsError;
use crate::path::VfsPath;

/// One directory visited by a [`Walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// The directory.
    pub path: VfsPath,
    /// Child directories, in backend order.
    pub dirnames: Vec<String>,
    /// Everything else, in backend order.
    pub filenames: Vec<String>,
}

enum Frame {
    Visit(VfsPath),
    Emit(WalkEntry),
}

type ErrorHandler<'a> = Box<dyn FnMut(VfsError) + 'a>;

/// Depth-first walk, built by [`VfsPath::walk`].
pub struct Walk<'a> {
    stack: Vec<Frame>,
    top_down: bool,
    follow_symlinks: bool,
    on_error: Option<ErrorHandler<'a>>,
}

impl fmt::Debug for Walk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walk")
            .field("pending", &self.stack.len())
            .field("top_down", &self.top_down)
            .field("follow_symlinks", &self.follow_symlinks)
            .finish()
    }
}

impl VfsPath {
    /// Walk the tree below this directory (top-down, links not followed).
    pub fn walk(&self) -> Walk<'static> {
        Walk {
            stack: vec![Frame::Visit(self.clone())],
            top_down: true,
            follow_symlinks: false,
            on_error: None,
        }
    }
}

impl<'a> Walk<'a> {
    /// Emit parents before (`true`) or after (`false`) their children.
    pub fn top_down(mut self, top_down: bool) -> Self {
        self.top_down = top_down;
        self
    }

    /// Descend into symlinked directories.
    ///
    /// There is no cycle protection here: a link pointing at one of its own
    /// ancestors makes the walk infinite.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Report listing failures to `handler` instead of dropping them.
    pub fn on_error<'b>(self, handler: impl FnMut(VfsError) + 'b) -> Walk<'b> {
        Walk {
            stack: self.stack,
            top_down: self.top_down,
            follow_symlinks: self.follow_symlinks,
            on_error: Some(Box::new(handler)),
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        while let Some(frame) = self.stack.pop() {
            let path = match frame {
                Frame::Emit(entry) => return Some(entry),
                Frame::Visit(path) => path,
            };

            let listing = match path.scandir() {
                Ok(listing) => listing,
                Err(e) => {
                    if let Some(handler) = self.on_error.as_mut() {
                        handler(e);
                    }
                    continue;
                }
            };

            let mut dirnames = Vec::new();
            let mut filenames = Vec::new();
            let mut children = Vec::new();
            for child in listing {
                if child.is_dir(self.follow_symlinks) {
                    dirnames.push(child.name().to_string());
                    children.push(Frame::Visit(child.into_path()));
                } else {
                    filenames.push(child.name().to_string());
                }
            }
            children.reverse();
            let entry = WalkEntry {
                path,
                dirnames,
                filenames,
            };

            if self.top_down {
                self.stack.extend(children);
                return Some(entry);
            }
            self.stack.push(Frame::Emit(entry));
            self.stack.extend(children);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::config::NamespaceConfig;
    use crate::mount::Namespace;
    use std::sync::Arc;

    fn namespace() -> Arc<Namespace> {
        let fs = MemoryBackend::new(true);
        fs.map_file("root/a/one", b"1".to_vec()).unwrap();
        fs.map_file("root/b/two", b"2".to_vec()).unwrap();
        fs.map_file("root/b/c/three", b"3".to_vec()).unwrap();
        fs.map_file("root/top", b"t".to_vec()).unwrap();
        fs.symlink("root/link", "/root/a").unwrap();

        let ns = Arc::new(Namespace::new(NamespaceConfig::case_sensitive()).unwrap());
        ns.mount("/", Arc::new(fs)).unwrap();
        ns
    }

    fn paths(walk: impl Iterator<Item = WalkEntry>) -> Vec<String> {
        walk.map(|e| e.path.to_string()).collect()
    }

    #[test]
    fn test_top_down_order() {
        let ns = namespace();
        let entries: Vec<_> = ns.path("/root").walk().collect();
        assert_eq!(
            paths(entries.clone().into_iter()),
            vec!["/root", "/root/a", "/root/b", "/root/b/c"]
        );
        assert_eq!(entries[0].dirnames, vec!["a", "b"]);
        assert_eq!(entries[0].filenames, vec!["top", "link"]);
        assert_eq!(entries[2].filenames, vec!["two"]);
    }

    #[test]
    fn test_bottom_up_order() {
        let ns = namespace();
        let walk = ns.path("/root").walk().top_down(false);
        assert_eq!(paths(walk), vec!["/root/a", "/root/b/c", "/root/b", "/root"]);
    }

    #[test]
    fn test_follow_symlinks() {
        let ns = namespace();
        let entries: Vec<_> = ns.path("/root").walk().follow_symlinks(true).collect();
        assert_eq!(entries[0].dirnames, vec!["a", "b", "link"]);
        let link = entries.iter().find(|e| e.path.name() == "link").unwrap();
        assert_eq!(link.filenames, vec!["one"]);
    }

    #[test]
    fn test_error_on_start() {
        let ns = namespace();
        let mut errors = Vec::new();
        let entries: Vec<_> = ns
            .path("/root/top")
            .walk()
            .on_error(|e| errors.push(e))
            .collect();
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VfsError::NotADirectory(_)));
    }

    #[test]
    fn test_missing_without_handler() {
        let ns = namespace();
        assert_eq!(ns.path("/nope").walk().count(), 0);
    }
}
