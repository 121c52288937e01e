//! Answer synthesis from retrieved context.
//!
//! Defines the [`GenerationBackend`] trait with Ollama and OpenAI
//! implementations, the fixed instruction template that constrains the
//! model to the supplied context, and [`synthesize`], which turns
//! retrieved passages plus a question into an [`Answer`] with provenance.
//!
//! Generation may use sampling (non-zero temperature), so output is not
//! reproducible across calls with identical input.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::models::{Answer, ScoredPassage, SourceRef};

/// Text completion backend: one prompt in, one completion out.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Model identifier (e.g. `"llama3.2"`).
    fn model_name(&self) -> &str;
    /// Generate a completion for `prompt`, bounded by the configured
    /// maximum output length.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Create the generation backend named by the configuration.
pub fn create_backend(config: &GenerationConfig) -> anyhow::Result<Box<dyn GenerationBackend>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

/// Build the instruction prompt from retrieved passages and the question.
///
/// The template tells the model to answer strictly from the supplied
/// context and to say it could not find the answer rather than fabricate.
pub fn build_prompt(question: &str, retrieved: &[ScoredPassage]) -> String {
    let context = retrieved
        .iter()
        .map(|s| s.passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following context to answer the question. \
         If you cannot find the answer in the context, say \
         'I could not find the answer in the provided document.'\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context, question
    )
}

/// Generate an answer grounded in the retrieved passages.
///
/// Returns the model output verbatim plus one [`SourceRef`] per retrieved
/// passage so the caller can display provenance. Backend failures surface
/// as [`Error::Synthesis`], distinct from "no document loaded".
pub async fn synthesize(
    backend: &dyn GenerationBackend,
    question: &str,
    retrieved: &[ScoredPassage],
) -> Result<Answer> {
    let prompt = build_prompt(question, retrieved);
    let answer = backend.generate(&prompt).await?;

    let sources = retrieved
        .iter()
        .map(|s| SourceRef {
            content: s.passage.text.clone(),
            page: s.passage.page,
        })
        .collect();

    Ok(Answer { answer, sources })
}

// ============ Ollama backend ============

/// Generation backend using a local Ollama instance (`POST /api/generate`,
/// non-streaming).
pub struct OllamaGenerator {
    model: String,
    url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::Synthesis(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::Synthesis("invalid Ollama response: missing response field".to_string())
            })
    }
}

// ============ OpenAI backend ============

/// Generation backend using the OpenAI chat completions API. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "OpenAI API error {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::Synthesis("invalid OpenAI response: missing message content".to_string())
            })
    }
}
