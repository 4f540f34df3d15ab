//! Fixer configuration stored in `.autofix.toml` at the project root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::dotenv::DotEnv;
use crate::io::prompt::TEMPLATE_NAMES;

pub const DEFAULT_CONFIG_FILE: &str = ".autofix.toml";

/// Fixer configuration (TOML).
///
/// Built once at process start and passed into the pipeline. Missing fields
/// default to the values the CI job has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutofixConfig {
    /// Master switch. When false, `autofix ci` is a successful no-op.
    pub enabled: bool,

    /// Directory (relative to the project root) that stack-frame paths are anchored into.
    pub source_root: PathBuf,

    pub tests: TestsConfig,
    pub parser: ParserConfig,
    pub llm: LlmConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestsConfig {
    /// Explicit test command. Takes precedence over the manifest.
    pub command: Option<String>,
    /// Manifest consulted for a declared `scripts.test` entry.
    pub manifest: PathBuf,
    /// Command run when the manifest declares a test script.
    pub manifest_command: String,
    /// Conventional test directories checked by the probe.
    pub test_dirs: Vec<String>,
    /// Wall-clock limit for one test run.
    pub timeout_secs: u64,
    /// Truncate captured test output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            command: None,
            manifest: PathBuf::from("package.json"),
            manifest_command: "npm test".to_string(),
            test_dirs: ["test", "tests", "__tests__", "src/__tests__"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Path fragments that disqualify a stack frame as a fix target.
    pub exclusion_markers: Vec<String>,
    /// Glob patterns that disqualify a fix target.
    pub exclude_patterns: Vec<String>,
    /// Characters of raw output echoed when no source file can be identified.
    pub excerpt_chars: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            exclusion_markers: [".test.", ".spec.", "node_modules"]
                .into_iter()
                .map(String::from)
                .collect(),
            exclude_patterns: [
                "*.config.*",
                "**/dummy-data/**",
                "**/github-actions/**",
                "docs/**",
                "package*.json",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excerpt_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Environment variable (or `.env` key) holding the API key.
    pub api_key_env: String,
    /// Optional `.env` file, relative to the project root.
    pub env_file: PathBuf,
    pub timeout_secs: u64,
    /// Prompt template name.
    pub template: String,
    /// low, medium or high. Passed to the prompt.
    pub safety_level: String,
    /// Extra prompt variables. A key that names a built-in variable replaces
    /// it; the default template prints `project_notes` when set.
    pub custom_variables: BTreeMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 1500,
            temperature: 0.1,
            api_key_env: "GROQ_API_KEY".to_string(),
            env_file: PathBuf::from(".env"),
            timeout_secs: 120,
            template: "default".to_string(),
            safety_level: "medium".to_string(),
            custom_variables: BTreeMap::new(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the process environment, then from `.env`.
    pub fn resolve_api_key(&self, dotenv: &DotEnv) -> Option<String> {
        dotenv
            .lookup(&self.api_key_env)
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishConfig {
    /// Fixed commit message; CI tooling greps for it.
    pub message: String,
    pub remote: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            message: "🤖 Auto-fix: Resolve test failures".to_string(),
            remote: "origin".to_string(),
        }
    }
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_root: PathBuf::from("."),
            tests: TestsConfig::default(),
            parser: ParserConfig::default(),
            llm: LlmConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl AutofixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_root.is_absolute() {
            return Err(anyhow!("source_root must be relative to the project root"));
        }
        if let Some(command) = &self.tests.command
            && command.trim().is_empty()
        {
            return Err(anyhow!("tests.command must not be empty when set"));
        }
        if self.tests.manifest_command.trim().is_empty() {
            return Err(anyhow!("tests.manifest_command must not be empty"));
        }
        if self.tests.timeout_secs == 0 {
            return Err(anyhow!("tests.timeout_secs must be > 0"));
        }
        if self.tests.output_limit_bytes == 0 {
            return Err(anyhow!("tests.output_limit_bytes must be > 0"));
        }
        if self.parser.excerpt_chars == 0 {
            return Err(anyhow!("parser.excerpt_chars must be > 0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be within 0.0..=2.0"));
        }
        if !TEMPLATE_NAMES.contains(&self.llm.template.as_str()) {
            return Err(anyhow!(
                "llm.template '{}' is unknown (expected one of: {})",
                self.llm.template,
                TEMPLATE_NAMES.join(", ")
            ));
        }
        if !matches!(self.llm.safety_level.as_str(), "low" | "medium" | "high") {
            return Err(anyhow!("llm.safety_level must be low, medium or high"));
        }
        if self.publish.message.trim().is_empty() {
            return Err(anyhow!("publish.message must not be empty"));
        }
        if self.publish.remote.trim().is_empty() {
            return Err(anyhow!("publish.remote must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutofixConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutofixConfig> {
    if !path.exists() {
        let cfg = AutofixConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutofixConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutofixConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
