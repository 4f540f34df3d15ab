//! Chat-completions patch generator.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default). The response text is returned verbatim; fence stripping and
//! validation happen in the patch orchestrator.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::LlmConfig;
use crate::io::prompt::PromptRenderer;
use crate::patch::{PatchGenerator, PatchRequest};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsGenerator {
    client: reqwest::blocking::Client,
    renderer: PromptRenderer,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    api_key_env: String,
    api_key: Option<String>,
}

impl ChatCompletionsGenerator {
    /// Build a generator. A missing key is reported on first use so that
    /// runs which never reach the fix stage do not need one.
    pub fn new(cfg: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            renderer: PromptRenderer::new(&cfg.template, &cfg.safety_level)?
                .with_variables(cfg.custom_variables.clone()),
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            api_key_env: cfg.api_key_env.clone(),
            api_key,
        })
    }

    fn body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl PatchGenerator for ChatCompletionsGenerator {
    #[instrument(skip_all, fields(model = %self.model, file = %request.file_path.display()))]
    fn generate(&self, request: &PatchRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("{} is not set (environment or .env)", self.api_key_env))?;
        let prompt = self.renderer.render(request)?;
        debug!(prompt_chars = prompt.chars().count(), "sending chat completion");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&self.body(&prompt))
            .send()
            .with_context(|| format!("POST {}", self.base_url))?;
        let status = response.status();
        let text = response.text().context("read completion response body")?;
        if !status.is_success() {
            return Err(anyhow!("completion endpoint returned {status}: {}", text.trim()));
        }
        let answer = extract_answer(&text)?;
        debug!(answer_chars = answer.chars().count(), "received completion");
        Ok(answer)
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn extract_answer(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("decode chat completion response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("completion response has no message content"))
}
