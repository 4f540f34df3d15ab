//! Test command resolution from config and the project manifest.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::io::config::TestsConfig;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Return the manifest's `scripts.test` entry, if declared and non-empty.
pub fn declared_test_script(manifest_path: &Path) -> Result<Option<String>> {
    let raw = fs::read_to_string(manifest_path)
        .with_context(|| format!("read {}", manifest_path.display()))?;
    let manifest: PackageJson = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", manifest_path.display()))?;
    let script = manifest
        .scripts
        .get("test")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(script)
}

/// Resolve the shell command used to run the test suite.
///
/// An explicit `tests.command` wins. Otherwise the manifest must declare a
/// `test` script, in which case `tests.manifest_command` is used. Manifest
/// read or parse failures count as "no command".
pub fn resolve_test_command(root: &Path, tests: &TestsConfig) -> Option<String> {
    if let Some(command) = &tests.command {
        return Some(command.clone());
    }
    let manifest_path = root.join(&tests.manifest);
    match declared_test_script(&manifest_path) {
        Ok(Some(script)) => {
            debug!(script = %script, "manifest declares a test script");
            Some(tests.manifest_command.clone())
        }
        Ok(None) => {
            debug!(manifest = %manifest_path.display(), "no test script in manifest");
            None
        }
        Err(err) => {
            debug!(err = %format!("{err:#}"), "manifest unreadable, treating as no tests");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, body: &str) {
        fs::write(dir.join("package.json"), body).expect("write manifest");
    }

    #[test]
    fn explicit_command_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tests = TestsConfig {
            command: Some("make check".to_string()),
            ..TestsConfig::default()
        };
        assert_eq!(
            resolve_test_command(temp.path(), &tests).as_deref(),
            Some("make check")
        );
    }

    #[test]
    fn manifest_test_script_maps_to_manifest_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_manifest(temp.path(), r#"{"scripts":{"test":"jest"}}"#);
        assert_eq!(
            resolve_test_command(temp.path(), &TestsConfig::default()).as_deref(),
            Some("npm test")
        );
    }

    #[test]
    fn missing_or_blank_script_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_manifest(temp.path(), r#"{"scripts":{"build":"tsc","test":"  "}}"#);
        assert_eq!(resolve_test_command(temp.path(), &TestsConfig::default()), None);

        write_manifest(temp.path(), r#"{"name":"x"}"#);
        assert_eq!(resolve_test_command(temp.path(), &TestsConfig::default()), None);
    }

    #[test]
    fn unreadable_manifest_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(resolve_test_command(temp.path(), &TestsConfig::default()), None);

        write_manifest(temp.path(), "{ not json");
        assert_eq!(resolve_test_command(temp.path(), &TestsConfig::default()), None);
    }
}
