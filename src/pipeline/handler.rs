use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::locale::{first_empty_key, parse_locale_map, BATCH_SIZE};

use super::completion::ClientFactory;
use super::orchestrator::{BatchOrchestrator, MergedResult, OrchestrateError};
use super::prompts::Mode;

pub const MSG_MISSING_PARAMS: &str = "Please provide all required parameters";
pub const MSG_MISSING_KEY: &str = "Please provide an OpenAI API key";
pub const MSG_INVALID_JSON: &str = "Please enter valid json";
pub const MSG_EMPTY_VALUES: &str = "Please fill all empty values";
pub const MSG_UPSTREAM: &str = "The request couldn't be processed. Maybe the API key is invalid?";
pub const MSG_UNPARSEABLE: &str = "The result couldn't be parsed. Please try again.";

/// Body of `POST /api/process`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub input_language: Option<String>,
    #[serde(default)]
    pub output_language: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HandlerResponse {
    /// Rejected before any outbound call (HTTP 400).
    BadRequest(String),
    /// Orchestration failed (HTTP 200, `success: false`).
    Failure(String),
    Success(MergedResult),
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum Envelope<'a> {
    Error {
        error: &'a str,
    },
    Outcome {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<&'a MergedResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
}

impl HandlerResponse {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }

    pub fn envelope(&self) -> Envelope<'_> {
        match self {
            Self::BadRequest(msg) => Envelope::Error { error: msg.as_str() },
            Self::Failure(msg) => Envelope::Outcome {
                success: false,
                data: None,
                error: Some(msg.as_str()),
            },
            Self::Success(data) => Envelope::Outcome {
                success: true,
                data: Some(data),
                error: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct HandlerConfig {
    /// Credential used when the request carries no `key`.
    pub env_api_key: Option<String>,
    pub batch_size: usize,
    pub strict_keys: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            env_api_key: None,
            batch_size: BATCH_SIZE,
            strict_keys: false,
        }
    }
}

impl std::fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("env_api_key", &self.env_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("batch_size", &self.batch_size)
            .field("strict_keys", &self.strict_keys)
            .finish()
    }
}

pub struct RequestHandler {
    factory: Arc<dyn ClientFactory>,
    cfg: HandlerConfig,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl RequestHandler {
    pub fn new(factory: Arc<dyn ClientFactory>, cfg: HandlerConfig) -> Self {
        Self { factory, cfg }
    }

    pub async fn handle(&self, req: ProcessRequest) -> HandlerResponse {
        let (Some(text), Some(input_language), Some(output_language), Some(mode)) = (
            non_empty(&req.text),
            non_empty(&req.input_language),
            non_empty(&req.output_language),
            non_empty(&req.mode),
        ) else {
            warn!("rejecting request with missing parameters");
            return HandlerResponse::BadRequest(MSG_MISSING_PARAMS.to_string());
        };

        let Some(api_key) = non_empty(&req.key).or(non_empty(&self.cfg.env_api_key)) else {
            warn!("rejecting request without credential");
            return HandlerResponse::BadRequest(MSG_MISSING_KEY.to_string());
        };

        let Some(mode) = Mode::parse(mode) else {
            warn!(mode, "rejecting request with unknown mode");
            return HandlerResponse::BadRequest(MSG_MISSING_PARAMS.to_string());
        };

        let map = match parse_locale_map(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "rejecting unparseable locale json");
                return HandlerResponse::BadRequest(MSG_INVALID_JSON.to_string());
            }
        };

        if mode == Mode::Translate {
            if let Some(key) = first_empty_key(&map) {
                warn!(key, "rejecting translate request with empty value");
                return HandlerResponse::BadRequest(MSG_EMPTY_VALUES.to_string());
            }
        }

        let client = match self.factory.connect(api_key) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "could not build completion client");
                return HandlerResponse::Failure(MSG_UPSTREAM.to_string());
            }
        };

        info!(
            keys = map.len(),
            mode = mode.as_str(),
            from = input_language,
            to = output_language,
            "processing locale map"
        );
        let orchestrator = BatchOrchestrator::new(client)
            .with_batch_size(self.cfg.batch_size)
            .with_strict_keys(self.cfg.strict_keys);
        match orchestrator
            .run(&map, mode, input_language, output_language)
            .await
        {
            Ok(merged) => HandlerResponse::Success(merged),
            Err(OrchestrateError::Upstream { .. }) => {
                HandlerResponse::Failure(MSG_UPSTREAM.to_string())
            }
            Err(OrchestrateError::Parse { .. }) => {
                HandlerResponse::Failure(MSG_UNPARSEABLE.to_string())
            }
        }
    }
}
