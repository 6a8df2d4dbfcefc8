use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::locale::LocaleMap;

use super::prompts::{user_payload, Mode, PromptSet};

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub mode: Mode,
    pub input_language: String,
    pub output_language: String,
    pub chunk: LocaleMap,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion api rejected the credential")]
    Authentication,
    #[error("completion api rate limit exceeded")]
    RateLimited,
    #[error("completion api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("completion api returned no choices")]
    NoChoices,
    #[error("encode payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("completion task interrupted: {0}")]
    Interrupted(String),
}

/// One chat-completion call per chunk; returns the raw reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Builds a client bound to one credential.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn CompletionClient>, CompletionError>;
}

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub api_base: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub request_timeout: Option<Duration>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            request_timeout: None,
        }
    }
}

pub struct OpenAiClientFactory {
    http: reqwest::Client,
    settings: Arc<OpenAiSettings>,
    prompts: Arc<PromptSet>,
}

impl OpenAiClientFactory {
    pub fn new(settings: OpenAiSettings, prompts: PromptSet) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = settings.request_timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            settings: Arc::new(settings),
            prompts: Arc::new(prompts),
        })
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn CompletionClient>, CompletionError> {
        Ok(Arc::new(OpenAiClient {
            http: self.http.clone(),
            settings: self.settings.clone(),
            prompts: self.prompts.clone(),
            api_key: api_key.to_string(),
        }))
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    settings: Arc<OpenAiSettings>,
    prompts: Arc<PromptSet>,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.settings.api_base)
            .field("model", &self.settings.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let user = user_payload(
            request.mode,
            &request.input_language,
            &request.output_language,
            &request.chunk,
        )?;
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: self.prompts.system_prompt(request.mode),
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            n: 1,
            temperature: self.settings.temperature,
        };

        let url = format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'));
        debug!(%url, keys = request.chunk.len(), mode = request.mode.as_str(), "chat completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(CompletionError::Authentication);
        }
        if status.as_u16() == 429 {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoices)?;
        Ok(first.message.content.unwrap_or_default())
    }
}
