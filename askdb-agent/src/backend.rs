//! Text-generation backends for the agent — multi-provider support
//!
//! Provides a `TextGenBackend` trait with implementations for:
//! - **OpenAI** — chat-completions API
//! - **Hugging Face** — hosted inference API
//!
//! Both providers expose the same contract and are substitutable per request.

use askdb_core::config::{HuggingFaceConfig, OpenAiConfig};
use askdb_core::{extract, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Upper bound on any single backoff interval.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

// ============================================================================
// TextGenBackend trait
// ============================================================================

/// Abstraction over hosted text-generation providers.
#[async_trait]
pub trait TextGenBackend: Send + Sync {
    /// Generate a completion. `system` is used as the system turn by chat
    /// backends and prepended to the prompt by completion backends.
    /// `max_tokens` bounds the output budget for this call.
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;

    /// Provider-dependent post-processing of a summarizer reply into the
    /// final sentence.
    fn extract_summary(&self, raw: &str) -> String;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Configured model identifier.
    fn model(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {body}")]
    Api { code: u16, body: String },

    #[error("no generated text in response")]
    NoGeneratedText,

    #[error("Missing API key")]
    MissingApiKey,
}

/// Create the backend for a provider key. Credentials come from the
/// environment at construction time.
pub fn create_backend(
    provider: Provider,
    openai: &OpenAiConfig,
    huggingface: &HuggingFaceConfig,
) -> Result<Box<dyn TextGenBackend>, GenerationError> {
    match provider {
        Provider::OpenAi => Ok(Box::new(OpenAiBackend::new(openai.clone())?)),
        Provider::HuggingFace => Ok(Box::new(HuggingFaceBackend::new(huggingface.clone())?)),
    }
}

/// Run `attempt` up to `max_attempts` times with capped, jittered exponential
/// backoff. The last error is returned as-is so callers keep the upstream
/// status code.
async fn with_retries<F, Fut>(
    max_attempts: usize,
    first_delay_ms: u64,
    backend: &str,
    attempt: F,
) -> Result<String, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, GenerationError>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(first_delay_ms)
        .max_delay(MAX_BACKOFF)
        .map(jitter)
        .take(max_attempts.saturating_sub(1));

    match Retry::spawn(retry_strategy, attempt).await {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::error!(
                attempts = max_attempts,
                backend = backend,
                error = %e,
                "All generation attempts failed"
            );
            Err(e)
        }
    }
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

// ============================================================================
// OpenAiBackend
// ============================================================================

/// OpenAI chat-completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::with_api_key(config, api_key)
    }

    /// Construct with an explicit key (and whatever `base_url` the config
    /// carries) — used by tests against a fake upstream.
    pub fn with_api_key(config: OpenAiConfig, api_key: String) -> Result<Self, GenerationError> {
        if api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    async fn generate_once(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), body = %body, "OpenAI API error");
            return Err(GenerationError::Api {
                code: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or(GenerationError::NoGeneratedText)
    }
}

#[async_trait]
impl TextGenBackend for OpenAiBackend {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        with_retries(
            self.config.max_retries,
            self.config.retry_delay_ms,
            "openai",
            || self.generate_once(system, prompt, max_tokens),
        )
        .await
    }

    /// Chat replies are used directly, trimmed.
    fn extract_summary(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Hugging Face API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct HfRequest {
    inputs: String,
    parameters: HfParameters,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    max_new_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct HfGenerated {
    generated_text: Option<String>,
    translation_text: Option<String>,
}

// ============================================================================
// HuggingFaceBackend
// ============================================================================

/// Hugging Face hosted-inference backend.
#[derive(Debug, Clone)]
pub struct HuggingFaceBackend {
    client: Client,
    config: HuggingFaceConfig,
    /// Empty string means anonymous access — some hosted models allow it.
    api_token: String,
}

impl HuggingFaceBackend {
    pub fn new(config: HuggingFaceConfig) -> Result<Self, GenerationError> {
        let api_token = std::env::var("HF_API_TOKEN").unwrap_or_default();
        Self::with_api_token(config, api_token)
    }

    pub fn with_api_token(
        config: HuggingFaceConfig,
        api_token: String,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            api_token,
        })
    }

    async fn generate_once(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}", self.config.base_url, self.config.model);

        let request = HfRequest {
            inputs: prompt.to_string(),
            parameters: HfParameters {
                max_new_tokens,
                temperature: self.config.temperature,
            },
        };

        let mut builder = self.client.post(&url).json(&request);
        if !self.api_token.is_empty() {
            builder = builder.bearer_auth(&self.api_token);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), body = %body, "Hugging Face API error");
            return Err(GenerationError::Api {
                code: status.as_u16(),
                body,
            });
        }

        let reply: Vec<HfGenerated> = response.json().await?;
        reply
            .into_iter()
            .next()
            .and_then(|item| item.generated_text.or(item.translation_text))
            .map(|text| text.trim().to_string())
            .ok_or(GenerationError::NoGeneratedText)
    }
}

#[async_trait]
impl TextGenBackend for HuggingFaceBackend {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        // Completion-style API: the system preamble is folded into the input.
        let input = match system {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        with_retries(
            self.config.max_retries,
            self.config.retry_delay_ms,
            "huggingface",
            || self.generate_once(&input, max_tokens),
        )
        .await
    }

    /// Instruction-tuned models echo a lot; take the last quoted sentence.
    fn extract_summary(&self, raw: &str) -> String {
        extract::last_quoted_sentence(raw)
    }

    fn name(&self) -> &str {
        "huggingface"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// TESTS
// ============================================================================
