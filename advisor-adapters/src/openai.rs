//! `OpenAI`-compatible chat completions backend.
//!
//! Also serves gateways that expose `v1/chat/completions` with bearer auth.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hyper::Uri;
use hyper::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::AdapterConfig;
use crate::http_client::{HyperClient, build_https_client, endpoint, post_json};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, FinishReason, GenerationRequest,
    ModelAdapter, ResponseFormat, TokenUsage,
};

/// Variable read by [`OpenAiAdapter::from_env`].
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Chat completions client; the instruction becomes a `system` message.
pub struct OpenAiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    authorization: HeaderValue,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] without an API key.
    pub fn new(config: &AdapterConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: build_https_client(),
            endpoint: endpoint(
                "OpenAI",
                config.base_url_or(DEFAULT_BASE_URL),
                "v1/chat/completions",
            )?,
            metadata: AdapterMetadata::new("openai", config.model()),
            authorization: config.api_key_header("OpenAI", |key| format!("Bearer {key}"))?,
            timeout: config.timeout(),
            default_temperature: config.default_temperature(),
        })
    }

    /// Builds the adapter with the key from [`OPENAI_API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// See [`OpenAiAdapter::new`].
    pub fn from_env(model: impl Into<String>) -> AdapterResult<Self> {
        Self::new(&AdapterConfig::new(model).with_api_key_from_env(OPENAI_API_KEY_ENV))
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> ChatCompletion<'a> {
        let system = request.instruction().map(|content| ChatMessage {
            role: "system",
            content,
        });
        let user = ChatMessage {
            role: "user",
            content: request.prompt(),
        };

        ChatCompletion {
            model: self.metadata.model(),
            messages: system.into_iter().chain([user]).collect(),
            temperature: request.temperature().or(self.default_temperature),
            max_tokens: request.max_output_tokens(),
            response_format: (request.response_format() == ResponseFormat::Json)
                .then_some(JsonMode {
                    kind: "json_object",
                }),
        }
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        let body = serde_json::to_vec(&self.body(&request)).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode OpenAI request: {err}"))
        })?;
        let headers = [(AUTHORIZATION, self.authorization.clone())];
        let bytes = post_json(
            &self.client,
            "OpenAI",
            self.endpoint.clone(),
            &headers,
            body,
            self.timeout,
        )
        .await?;

        let reply: ChatCompletionReply = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode OpenAI response: {err}"))
        })?;
        reply.into_completion()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletion<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonMode>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonMode {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatCompletionReply {
    fn into_completion(self) -> AdapterResult<Completion> {
        if let Some(error) = self.error {
            return Err(AdapterError::response(error.message));
        }
        let (content, finish) = self
            .choices
            .into_iter()
            .find_map(|choice| {
                let content = choice.message.and_then(|message| message.content)?;
                Some((content, choice.finish_reason.unwrap_or_default()))
            })
            .ok_or_else(|| AdapterError::response("OpenAI returned no message content"))?;

        let mut completion = Completion::new(content).with_finish(FinishReason::from_provider(&finish));
        if let Some(usage) = self.usage {
            completion = completion.with_usage(TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }
        Ok(completion)
    }
}
