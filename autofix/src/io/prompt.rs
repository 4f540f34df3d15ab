//! Bug-fix prompt rendering.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, Value};

use crate::patch::PatchRequest;

const DEFAULT_TEMPLATE: &str = include_str!("prompts/default.md");
const MINIMAL_TEMPLATE: &str = include_str!("prompts/minimal.md");

/// Names accepted by `llm.template`.
pub const TEMPLATE_NAMES: &[&str] = &["default", "minimal"];

/// Error message used when the caller supplies no failure context.
const FALLBACK_ERROR: &str = "Analyze the code for potential issues";

/// Template engine wrapper around minijinja.
pub struct PromptRenderer {
    env: Environment<'static>,
    template: String,
    safety_level: String,
    custom_variables: BTreeMap<String, String>,
}

impl PromptRenderer {
    pub fn new(template: &str, safety_level: &str) -> Result<Self> {
        if !TEMPLATE_NAMES.contains(&template) {
            return Err(anyhow!("unknown prompt template '{template}'"));
        }
        let mut env = Environment::new();
        env.add_template("default", DEFAULT_TEMPLATE)
            .context("register default template")?;
        env.add_template("minimal", MINIMAL_TEMPLATE)
            .context("register minimal template")?;
        Ok(Self {
            env,
            template: template.to_string(),
            safety_level: safety_level.to_string(),
            custom_variables: BTreeMap::new(),
        })
    }

    /// Extra variables merged over the built-in ones at render time.
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.custom_variables = variables;
        self
    }

    pub fn render(&self, request: &PatchRequest) -> Result<String> {
        let template = self.env.get_template(&self.template)?;
        let error_message = Some(request.error_context.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_ERROR);
        let mut vars: BTreeMap<String, Value> = BTreeMap::from([
            (
                "filename".to_string(),
                Value::from(request.file_path.display().to_string()),
            ),
            ("language".to_string(), Value::from(request.language.as_str())),
            ("code".to_string(), Value::from(request.current_content.as_str())),
            ("error_message".to_string(), Value::from(error_message)),
            ("safety_level".to_string(), Value::from(self.safety_level.as_str())),
        ]);
        for (key, value) in &self.custom_variables {
            vars.insert(key.clone(), Value::from(value.as_str()));
        }
        let rendered = template
            .render(&vars)
            .with_context(|| format!("render prompt template '{}'", self.template))?;
        Ok(rendered)
    }
}
