//! Base-name exclusion rules.

use glob::Pattern;
use std::path::Path;

/// A set of glob patterns tested against a file's base name.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    patterns: Vec<Pattern>,
}

impl ExclusionRules {
    /// Compile the given patterns.
    ///
    /// Malformed patterns are dropped: they can never match, so they never
    /// exclude anything.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::debug!("Ignoring malformed exclude pattern {:?}: {}", raw.as_ref(), e);
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// Number of usable patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no usable patterns exist.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether the base name of `path` matches any pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        self.patterns.iter().any(|p| p.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_matches_base_name_only() {
        let rules = ExclusionRules::new(&["*.tmp", "cache"]);

        assert!(rules.is_excluded(Path::new("data/b.tmp")));
        assert!(rules.is_excluded(Path::new("/abs/dir/cache")));
        assert!(!rules.is_excluded(Path::new("data/a.txt")));
        // Directory components are never matched
        assert!(!rules.is_excluded(Path::new("cache/a.txt")));
    }

    #[test]
    fn test_wildcards_and_classes() {
        let rules = ExclusionRules::new(&["?.log", "[ab]*.bak"]);

        assert!(rules.is_excluded(Path::new("x.log")));
        assert!(!rules.is_excluded(Path::new("xy.log")));
        assert!(rules.is_excluded(Path::new("a1.bak")));
        assert!(!rules.is_excluded(Path::new("c1.bak")));
    }

    #[test]
    fn test_malformed_pattern_matches_nothing() {
        let rules = ExclusionRules::new(&["[unclosed", "*.tmp"]);

        assert_eq!(rules.len(), 1);
        assert!(!rules.is_excluded(Path::new("[unclosed")));
        assert!(rules.is_excluded(Path::new("x.tmp")));
    }

    #[test]
    fn test_empty_rules() {
        let rules = ExclusionRules::new::<&str>(&[]);
        assert!(rules.is_empty());
        assert!(!rules.is_excluded(Path::new("anything")));
    }

    proptest! {
        #[test]
        fn prop_extension_pattern_excludes_matching_names(
            stem in "[a-z0-9_]{1,12}",
            ext in "[a-z]{1,4}",
            dir in "[a-z]{1,8}",
        ) {
            let rules = ExclusionRules::new(&[format!("*.{}", ext)]);
            let path = Path::new(&dir).join(format!("{}.{}", stem, ext));
            prop_assert!(rules.is_excluded(&path));
        }

        #[test]
        fn prop_literal_pattern_is_exact(
            name in "[a-z]{1,10}",
            other in "[a-z]{1,10}",
        ) {
            let rules = ExclusionRules::new(&[name.clone()]);
            prop_assert!(rules.is_excluded(Path::new(&name)));
            prop_assert_eq!(rules.is_excluded(Path::new(&other)), other == name);
        }
    }
}
