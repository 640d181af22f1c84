//! Namespace configuration.
//!
//! Loaded from RON by whatever opens the evidence source:
//!
//! ```ron
//! (
//!     case_sensitive: false,
//!     alt_separator: Some('\\'),
//!     anonymous_prefix: "$fs$",
//! )
//! ```
//!
//! Every field is optional and falls back to [`NamespaceConfig::default`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};
use crate::flavor::{Flavor, SEP};

/// Prefix under which unmounted backends appear.
pub const DEFAULT_ANONYMOUS_PREFIX: &str = "$fs$";

/// Dialect and addressing rules for a [`Namespace`](crate::Namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Compare names case-sensitively.
    pub case_sensitive: bool,
    /// Extra separator accepted on input (e.g. `\` for Windows evidence).
    pub alt_separator: Option<char>,
    /// First component of anonymous roots, e.g. `$fs$/0/...`.
    pub anonymous_prefix: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            alt_separator: None,
            anonymous_prefix: DEFAULT_ANONYMOUS_PREFIX.to_string(),
        }
    }
}

impl NamespaceConfig {
    /// Default configuration with case-sensitive names.
    pub fn case_sensitive() -> Self {
        Self {
            case_sensitive: true,
            ..Self::default()
        }
    }

    /// Accept `sep` as an alternate separator.
    pub fn with_alt_separator(mut self, sep: char) -> Self {
        self.alt_separator = Some(sep);
        self
    }

    /// Use `prefix` for anonymous roots.
    pub fn with_anonymous_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.anonymous_prefix = prefix.into();
        self
    }

    /// Parse and validate a RON document.
    pub fn from_ron(text: &str) -> VfsResult<Self> {
        let config: Self = ron::from_str(text).map_err(|e| VfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON.
    pub fn to_ron(&self) -> VfsResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Check the invariants the namespace relies on.
    pub fn validate(&self) -> VfsResult<()> {
        if self.alt_separator == Some(SEP) {
            return Err(VfsError::Config(format!(
                "alternate separator must differ from '{SEP}'"
            )));
        }
        let prefix = self.anonymous_prefix.as_str();
        if prefix.is_empty() || prefix == "." || prefix == ".." {
            return Err(VfsError::Config(format!(
                "anonymous prefix {prefix:?} is not a valid path component"
            )));
        }
        if prefix.contains(SEP) || self.alt_separator.is_some_and(|alt| prefix.contains(alt)) {
            return Err(VfsError::Config(format!(
                "anonymous prefix {prefix:?} contains a separator"
            )));
        }
        Ok(())
    }

    /// Shared flavor for these settings.
    pub fn flavor(&self) -> Arc<Flavor> {
        Flavor::interned(self.case_sensitive, self.alt_separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NamespaceConfig::default();
        assert!(!config.case_sensitive);
        assert_eq!(config.alt_separator, None);
        assert_eq!(config.anonymous_prefix, "$fs$");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_ron_partial() {
        let config = NamespaceConfig::from_ron("(alt_separator: Some('\\\\'))").unwrap();
        assert_eq!(config.alt_separator, Some('\\'));
        assert!(!config.case_sensitive);
        assert_eq!(config.anonymous_prefix, DEFAULT_ANONYMOUS_PREFIX);
    }

    #[test]
    fn test_from_ron_full() {
        let text = r#"(
            case_sensitive: true,
            alt_separator: None,
            anonymous_prefix: "anon",
        )"#;
        let config = NamespaceConfig::from_ron(text).unwrap();
        assert_eq!(config, NamespaceConfig::case_sensitive().with_anonymous_prefix("anon"));
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = NamespaceConfig::case_sensitive().with_alt_separator('\\');
        let text = config.to_ron().unwrap();
        assert_eq!(NamespaceConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_from_ron_syntax_error() {
        assert!(matches!(
            NamespaceConfig::from_ron("(case_sensitive: maybe)"),
            Err(VfsError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_bad_prefix() {
        for prefix in ["", "..", "a/b"] {
            let config = NamespaceConfig::default().with_anonymous_prefix(prefix);
            assert!(matches!(config.validate(), Err(VfsError::Config(_))), "{prefix}");
        }

        let config = NamespaceConfig::default()
            .with_alt_separator('\\')
            .with_anonymous_prefix("a\\b");
        assert!(matches!(config.validate(), Err(VfsError::Config(_))));
    }

    #[test]
    fn test_rejects_slash_alternate() {
        let config = NamespaceConfig::default().with_alt_separator('/');
        assert!(matches!(config.validate(), Err(VfsError::Config(_))));
    }

    #[test]
    fn test_flavor_follows_config() {
        let flavor = NamespaceConfig::case_sensitive().with_alt_separator('\\').flavor();
        assert!(flavor.case_sensitive());
        assert_eq!(flavor.alt_separator(), Some('\\'));
    }
}
