//! Failure parsing: map raw test output to the single implicated source file.
//!
//! Policy is first-match: frames are considered in textual order and the
//! first one that survives exclusion and resolves to an existing file wins.
//! Output with several failing files is not split.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::exclude::ExcludeSet;
use crate::core::frames::{has_exclusion_marker, scan_frames};
use crate::core::types::Failure;
use crate::io::config::AutofixConfig;

#[derive(Debug, Clone)]
pub struct FailureParser {
    root: PathBuf,
    source_root: PathBuf,
    markers: Vec<String>,
    excludes: ExcludeSet,
}

impl FailureParser {
    pub fn new(
        root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        markers: Vec<String>,
        excludes: ExcludeSet,
    ) -> Self {
        // Frames carry resolved paths, so `.` or a symlinked root must not
        // defeat the prefix match in `normalize`.
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            source_root: source_root.into(),
            markers,
            excludes,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, cfg: &AutofixConfig) -> Result<Self> {
        Ok(Self::new(
            root,
            cfg.source_root.clone(),
            cfg.parser.exclusion_markers.clone(),
            ExcludeSet::new(&cfg.parser.exclude_patterns)?,
        ))
    }

    /// Return the first acceptable failure in `output`, or `None`.
    #[instrument(skip_all, fields(output_bytes = output.len()))]
    pub fn parse(&self, output: &str) -> Option<Failure> {
        for frame in scan_frames(output) {
            if has_exclusion_marker(frame.path, &self.markers) {
                debug!(path = frame.path, "skipping frame with exclusion marker");
                continue;
            }
            let Some(relative) = self.normalize(frame.path) else {
                debug!(path = frame.path, "skipping frame outside project");
                continue;
            };
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if let Some(pattern) = self.excludes.matching(&relative_str) {
                debug!(path = %relative_str, pattern, "skipping excluded path");
                continue;
            }
            if !self.root.join(&relative).is_file() {
                debug!(path = %relative_str, "skipping frame with no file on disk");
                continue;
            }
            debug!(path = %relative_str, line = frame.line, column = frame.column, "selected fix target");
            return Some(Failure {
                source_file: relative,
                error_context: output.to_string(),
            });
        }
        None
    }

    /// Map a frame path to a path relative to the project root.
    ///
    /// Absolute paths inside the project root are made relative to it. Any
    /// other path loses its `./` or leading `/` and is anchored into the
    /// source root. Paths that climb out of the project are rejected.
    fn normalize(&self, frame_path: &str) -> Option<PathBuf> {
        let path = Path::new(frame_path);
        if path.is_absolute() {
            if let Ok(inside) = path.strip_prefix(&self.root) {
                return clean_relative(inside);
            }
            if let Ok(resolved) = path.canonicalize()
                && let Ok(inside) = resolved.strip_prefix(&self.root)
            {
                return clean_relative(inside);
            }
        }
        let stripped = frame_path.trim_start_matches("./").trim_start_matches('/');
        clean_relative(&self.source_root.join(stripped))
    }
}

/// Drop `.` components and reject anything that is not a plain relative path.
fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(files: &[&str]) -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        for file in files {
            let path = temp.path().join(file);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, "// source\n").expect("write");
        }
        temp
    }

    fn parser(root: &Path) -> FailureParser {
        FailureParser::from_config(root, &AutofixConfig::default()).expect("parser")
    }

    #[test]
    fn absolute_frame_is_anchored_into_source_root() {
        let temp = project(&["src/util.js"]);
        let failure = parser(temp.path())
            .parse("at run (/src/util.js:10:4)")
            .expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/util.js"));
        assert_eq!(failure.error_context, "at run (/src/util.js:10:4)");
    }

    #[test]
    fn relative_frame_strips_dot_prefix() {
        let temp = project(&["lib/math.ts"]);
        let failure = parser(temp.path())
            .parse("    at sum (./lib/math.ts:3:9)")
            .expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("lib/math.ts"));
    }

    #[test]
    fn project_absolute_path_is_made_relative() {
        let temp = project(&["src/a.js"]);
        let output = format!("at f ({}:1:1)", temp.path().join("src/a.js").display());
        let failure = parser(temp.path()).parse(&output).expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/a.js"));
    }

    #[test]
    fn unresolved_root_still_matches_absolute_frames() {
        let temp = project(&["src/a.js"]);
        let resolved = temp.path().canonicalize().expect("canonicalize");
        let output = format!("at f ({}:1:1)", resolved.join("src/a.js").display());
        let failure = parser(&temp.path().join("src/.."))
            .parse(&output)
            .expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/a.js"));
    }

    #[test]
    fn source_root_re_anchors_paths() {
        let temp = project(&["agents/bug-fixer.js"]);
        let cfg = AutofixConfig {
            source_root: PathBuf::from("agents"),
            ..AutofixConfig::default()
        };
        let parser = FailureParser::from_config(temp.path(), &cfg).expect("parser");
        let failure = parser
            .parse("at fixBug (bug-fixer.js:12:5)")
            .expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("agents/bug-fixer.js"));
    }

    #[test]
    fn excluded_only_frames_yield_none() {
        let temp = project(&[
            "src/a.test.js",
            "src/b.spec.ts",
            "node_modules/x/index.js",
        ]);
        let output = "\
at Object.<anonymous> (src/a.test.js:1:1)
at it (src/b.spec.ts:2:2)
at run (node_modules/x/index.js:3:3)";
        assert_eq!(parser(temp.path()).parse(output), None);
    }

    #[test]
    fn first_acceptable_frame_wins_over_later_ones() {
        let temp = project(&["src/a.test.js", "src/first.js", "src/second.js"]);
        let output = "\
at Object.<anonymous> (src/a.test.js:1:1)
at first (src/first.js:2:2)
at second (src/second.js:3:3)";
        let failure = parser(temp.path()).parse(output).expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/first.js"));
    }

    #[test]
    fn frames_without_files_are_skipped() {
        let temp = project(&["src/real.js"]);
        let output = "at ghost (src/ghost.js:1:1)\nat real (src/real.js:2:2)";
        let failure = parser(temp.path()).parse(output).expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/real.js"));
    }

    #[test]
    fn glob_excludes_apply() {
        let temp = project(&["jest.config.js", "dummy-data/api.js", "src/ok.js"]);
        let output = "\
at load (jest.config.js:1:1)
at fake (dummy-data/api.js:1:1)
at ok (src/ok.js:1:1)";
        let failure = parser(temp.path()).parse(output).expect("failure");
        assert_eq!(failure.source_file, PathBuf::from("src/ok.js"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let temp = project(&["src/a.js"]);
        assert_eq!(parser(temp.path()).parse("at f (../outside.js:1:1)"), None);
    }

    #[test]
    fn output_without_frames_yields_none() {
        let temp = project(&["src/a.js"]);
        assert_eq!(parser(temp.path()).parse("Error: boom\n  1 failing"), None);
    }
}
