//! Path flavor: the separator and case dialect of a namespace.
//!
//! A flavor is a plain value keyed by `(case_sensitive, alt_separator)`.
//! [`Flavor::interned`] hands out one shared `Arc` per key so every path in a
//! namespace points at the same instance, but equality is always by value.
//!
//! Normalization here is lexical only. `..` is left alone by
//! [`Flavor::split`] because collapsing it before symlinks are resolved gives
//! the wrong answer; [`Flavor::normpath`] collapses it once that's safe.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};

use crate::error::{VfsError, VfsResult};

/// Primary separator of every namespace.
pub const SEP: char = '/';

static FLAVORS: OnceLock<DashMap<(bool, Option<char>), Arc<Flavor>>> = OnceLock::new();

/// Separator and case rules shared by all paths of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flavor {
    case_sensitive: bool,
    alt_separator: Option<char>,
}

impl Flavor {
    /// Build a flavor value without interning it.
    pub fn new(case_sensitive: bool, alt_separator: Option<char>) -> Self {
        Self {
            case_sensitive,
            alt_separator: alt_separator.filter(|c| *c != SEP),
        }
    }

    /// Shared instance for `(case_sensitive, alt_separator)`.
    pub fn interned(case_sensitive: bool, alt_separator: Option<char>) -> Arc<Flavor> {
        let flavor = Self::new(case_sensitive, alt_separator);
        let flavors = FLAVORS.get_or_init(DashMap::new);
        flavors
            .entry((flavor.case_sensitive, flavor.alt_separator))
            .or_insert_with(|| Arc::new(flavor))
            .clone()
    }

    /// Whether names compare case-sensitively.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Alternate separator accepted on input, if any.
    pub fn alt_separator(&self) -> Option<char> {
        self.alt_separator
    }

    /// Fold a component (or whole path) for comparison.
    pub fn casefold<'a>(&self, s: &'a str) -> Cow<'a, str> {
        if self.case_sensitive {
            Cow::Borrowed(s)
        } else {
            Cow::Owned(s.to_lowercase())
        }
    }

    /// Fold every component of a path.
    pub fn casefold_parts(&self, parts: &[String]) -> Vec<String> {
        parts.iter().map(|p| self.casefold(p).into_owned()).collect()
    }

    /// Returns true if `c` separates components in this flavor.
    pub fn is_separator(&self, c: char) -> bool {
        c == SEP || Some(c) == self.alt_separator
    }

    /// Returns true if `raw` starts at the namespace root.
    pub fn is_absolute(&self, raw: &str) -> bool {
        raw.starts_with(|c: char| self.is_separator(c))
    }

    /// Split a raw path into components.
    ///
    /// Splits on both separators and drops empty and `.` components. `..` is
    /// kept as-is.
    pub fn split(&self, raw: &str) -> Vec<String> {
        raw.split(|c: char| self.is_separator(c))
            .filter(|part| !part.is_empty() && *part != ".")
            .map(str::to_string)
            .collect()
    }

    /// Rewrite alternate separators to the primary one.
    pub fn to_primary(&self, raw: &str) -> String {
        match self.alt_separator {
            Some(alt) => raw.replace(alt, "/"),
            None => raw.to_string(),
        }
    }

    /// Lexically normalize a path string, collapsing `.` and `..`.
    ///
    /// Absolute paths stay absolute and `..` at the root is dropped; a
    /// relative path that normalizes to nothing becomes `.`.
    pub fn normpath(&self, raw: &str) -> String {
        let absolute = self.is_absolute(raw);
        let parts = collapse_dotdot(self.split(raw), absolute);
        let joined = parts.join("/");
        if absolute {
            format!("{SEP}{joined}")
        } else if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        }
    }

    /// Compile a shell-style glob into a matcher honoring the case rule.
    pub fn compile_pattern(&self, pattern: &str) -> VfsResult<GlobMatcher> {
        let regex = RegexBuilder::new(&translate(pattern))
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| VfsError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(GlobMatcher {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Home directories don't exist inside evidence.
    pub fn gethomedir(&self, _username: &str) -> VfsResult<String> {
        Err(VfsError::unsupported("gethomedir"))
    }
}

/// Collapse `..` components lexically.
///
/// For absolute paths a `..` at the top is dropped; for relative paths it is
/// kept so the result still points above the starting directory.
pub(crate) fn collapse_dotdot(parts: Vec<String>, absolute: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if part == ".." {
            if out.last().is_some_and(|last| last != "..") {
                out.pop();
            } else if !absolute {
                out.push(part);
            }
        } else {
            out.push(part);
        }
    }
    out
}

/// Returns true if `s` contains glob metacharacters.
pub fn has_magic(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    /// Match a whole string against the pattern.
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Translate a glob into an anchored regex (fnmatch semantics).
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < n {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while i < n && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }
                if j >= n {
                    out.push_str("\\[");
                    continue;
                }

                let body = &chars[i..j];
                i = j + 1;

                out.push('[');
                let mut rest = body;
                match rest.first() {
                    Some('!') => {
                        out.push('^');
                        rest = &rest[1..];
                    }
                    Some('^') => {
                        out.push_str("\\^");
                        rest = &rest[1..];
                    }
                    _ => {}
                }
                let mut prev = None;
                for &ch in rest {
                    if matches!(ch, '\\' | '[' | ']' | '&' | '~') || (ch == '-' && prev == Some('-')) {
                        out.push('\\');
                    }
                    out.push(ch);
                    prev = Some(ch);
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}
