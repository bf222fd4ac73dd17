//! Answer generation through an OpenAI-compatible chat completion API.
//!
//! [`CompletionProvider`] is the seam between the RAG engine and the model:
//! the engine builds the prompt, the provider turns it into text. The only
//! shipped backend is [`OpenAiChat`], which also works against any server
//! that implements `POST {base_url}/chat/completions`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::LlmConfig;

/// System message sent ahead of every prompt.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful travel assistant. Answer questions based on the provided context.";

/// One completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Look up the API key from `[llm].api_key` or `OPENAI_API_KEY`.
///
/// `config_path` only appears in the error message.
pub fn resolve_api_key(llm: &LlmConfig, config_path: &Path) -> Result<String> {
    match llm.effective_api_key() {
        Some(key) => Ok(key),
        None => bail!(
            "No OpenAI API key configured. Set [llm].api_key in {} or export OPENAI_API_KEY.",
            config_path.display()
        ),
    }
}

pub struct OpenAiChat {
    api_key: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(llm: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            api_key,
            model: llm.model.clone(),
            endpoint: format!("{}/chat/completions", llm.base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;
        extract_answer(parsed)
    }
}

fn extract_answer(parsed: ChatResponse) -> Result<String> {
    let answer = parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if answer.is_empty() {
        bail!("OpenAI returned an empty answer");
    }
    Ok(answer)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
