/// Exclusion patterns and visibility toggles.
use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-supplied regular expressions, compiled once per refresh.
///
/// Matching is case-insensitive. Patterns that fail to compile are logged
/// and left out; the remaining ones still apply.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    set: Option<RegexSet>,
    active: Vec<String>,
}

impl ExclusionFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut active = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match Regex::new(pattern) {
                Ok(_) => active.push(pattern.to_string()),
                Err(e) => warn!("Ignoring invalid exclusion pattern '{pattern}': {e}"),
            }
        }

        if active.is_empty() {
            return Self::default();
        }
        match RegexSetBuilder::new(&active).case_insensitive(true).build() {
            Ok(set) => Self {
                set: Some(set),
                active,
            },
            Err(e) => {
                warn!("Exclusion patterns could not be combined: {e}");
                Self::default()
            }
        }
    }

    /// `true` if any field matches any pattern.
    pub fn is_excluded(&self, fields: &[&str]) -> bool {
        match &self.set {
            Some(set) => fields.iter().any(|f| !f.is_empty() && set.is_match(f)),
            None => false,
        }
    }

    /// Patterns that compiled.
    pub fn patterns(&self) -> &[String] {
        &self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Compile errors for each invalid pattern, as `(pattern, message)`.
pub fn invalid_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<(String, String)> {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.trim().is_empty())
        .filter_map(|p| Regex::new(p.trim()).err().map(|e| (p.to_string(), e.to_string())))
        .collect()
}

/// Display toggles. Everything defaults to hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityFilter {
    /// Show software flagged as a system component or patch.
    pub show_system_components: bool,
    /// Show runtimes and redistributables.
    pub show_frameworks: bool,
    /// Show devices that are remembered but not attached.
    pub show_non_present: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let f = ExclusionFilter::new(&["^microsoft edge", "update helper$"]);
        assert!(f.is_excluded(&["Microsoft Edge WebView2 Runtime"]));
        assert!(f.is_excluded(&["Vendor", "Contoso UPDATE HELPER"]));
        assert!(!f.is_excluded(&["Firefox"]));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let f = ExclusionFilter::new(&["(unclosed", "steam"]);
        assert_eq!(f.patterns(), &["steam".to_string()]);
        assert!(f.is_excluded(&["Steam"]));

        let bad = invalid_patterns(&["(unclosed", "ok", ""]);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].0, "(unclosed");
    }

    #[test]
    fn empty_filter_excludes_nothing() {
        let f = ExclusionFilter::new::<&str>(&[]);
        assert!(f.is_empty());
        assert!(!f.is_excluded(&["anything"]));

        let blank = ExclusionFilter::new(&["  "]);
        assert!(blank.is_empty());
    }

    #[test]
    fn empty_fields_never_match() {
        let f = ExclusionFilter::new(&[".*"]);
        assert!(!f.is_excluded(&["", ""]));
        assert!(f.is_excluded(&["", "x"]));
    }
}
