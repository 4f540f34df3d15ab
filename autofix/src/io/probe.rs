//! Test availability probe.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::io::config::TestsConfig;
use crate::io::manifest::resolve_test_command;

/// Directories never scanned for test files.
const SKIP_DIRS: &[&str] = &[".git", "node_modules"];

/// Decides whether a project has a test suite at all.
pub trait TestProbe {
    fn has_tests(&self) -> bool;
}

/// Probe over a project directory on disk.
#[derive(Debug, Clone)]
pub struct ProjectProbe {
    root: PathBuf,
    tests: TestsConfig,
}

impl ProjectProbe {
    pub fn new(root: impl Into<PathBuf>, tests: TestsConfig) -> Self {
        Self {
            root: root.into(),
            tests,
        }
    }
}

impl TestProbe for ProjectProbe {
    /// Cheap checks first: no declared command means no filesystem scan.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    fn has_tests(&self) -> bool {
        if resolve_test_command(&self.root, &self.tests).is_none() {
            info!("no test command declared");
            return false;
        }
        if let Some(dir) = self
            .tests
            .test_dirs
            .iter()
            .find(|dir| self.root.join(dir).exists())
        {
            debug!(dir = %dir, "found conventional test directory");
            return true;
        }
        match find_test_file(&self.root) {
            Some(path) => {
                debug!(path = %path.display(), "found test file");
                true
            }
            None => {
                info!("test command declared but no test files found");
                false
            }
        }
    }
}

/// First file whose name follows the `*.test.*` / `*.spec.*` convention.
pub fn find_test_file(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| is_test_file_name(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIP_DIRS
            .iter()
            .any(|skip| entry.file_name() == std::ffi::OsStr::new(skip))
}

fn is_test_file_name(name: &str) -> bool {
    name.contains(".test.") || name.contains(".spec.")
}
