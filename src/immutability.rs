//! Immutable-tag policy: shell-style glob patterns over tag names.
//!
//! With no patterns configured, overwrite detection runs in observability
//! mode (counted and logged, never blocked). Any matching pattern switches
//! the tag to enforcement mode.

use glob::Pattern;

#[derive(Debug, Clone, Default)]
pub struct TagImmutability {
    patterns: Vec<String>,
}

impl TagImmutability {
    pub fn new(patterns: Vec<String>) -> Self {
        TagImmutability { patterns }
    }

    /// True when any configured pattern matches the tag. Invalid patterns are
    /// logged and skipped.
    pub fn is_immutable(&self, tag: &str) -> bool {
        for pattern in &self.patterns {
            match Pattern::new(pattern) {
                Ok(compiled) => {
                    if compiled.matches(tag) {
                        return true;
                    }
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "invalid immutable tag pattern");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_configured_globs() {
        let policy = TagImmutability::new(vec![
            "prod-*".to_string(),
            "release-*".to_string(),
            "v[0-9]*".to_string(),
        ]);

        for (tag, expected) in [
            ("prod-1h", true),
            ("prod-latest", true),
            ("release-1.0", true),
            ("v1", true),
            ("v123", true),
            ("dev-1h", false),
            ("test", false),
            ("latest", false),
            ("1h", false),
        ] {
            assert_eq!(policy.is_immutable(tag), expected, "tag {}", tag);
        }
    }

    #[test]
    fn no_patterns_means_nothing_immutable() {
        let policy = TagImmutability::default();
        assert!(!policy.is_immutable("prod-1h"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let policy = TagImmutability::new(vec!["[invalid".to_string()]);
        assert!(!policy.is_immutable("test"));
    }
}
