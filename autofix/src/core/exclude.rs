//! Glob exclusion patterns for fix targets.
//!
//! Patterns use `/`-separated relative paths. `*` and `?` stay within one
//! path segment and `**` spans segments. A pattern without a `/` is matched
//! against the file name only, so `*.config.*` excludes `jest.config.js` at
//! any depth.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    /// Source text, compiled pattern, whether it names directories.
    patterns: Vec<(String, Pattern, bool)>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = Pattern::new(pattern)
                .with_context(|| format!("compile exclude pattern '{pattern}'"))?;
            compiled.push((pattern.to_string(), glob, pattern.contains('/')));
        }
        Ok(Self { patterns: compiled })
    }

    /// Return the first pattern that matches `relative_path`, if any.
    pub fn matching(&self, relative_path: &str) -> Option<&str> {
        let normalized = relative_path.replace('\\', "/");
        let normalized = normalized.trim_start_matches("./");
        let file_name = normalized.rsplit('/').next().unwrap_or(normalized);
        self.patterns
            .iter()
            .find(|(_, glob, has_dirs)| {
                let subject = if *has_dirs { normalized } else { file_name };
                glob.matches_with(subject, MATCH_OPTIONS)
            })
            .map(|(pattern, _, _)| pattern.as_str())
    }
}
