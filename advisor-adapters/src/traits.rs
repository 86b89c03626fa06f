//! The adapter seam: one instruction plus one prompt in, one completion out.
//!
//! Advisory flows never hold a conversation, so a [`GenerationRequest`]
//! carries a single user prompt and an optional system instruction, and a
//! [`Completion`] is the whole answer rather than a token stream.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by model adapters.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Failures a backend can report.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Missing credentials or an unusable endpoint.
    #[error("adapter not configured: {reason}")]
    Configuration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The request could not be sent as built.
    #[error("invalid generation request: {reason}")]
    InvalidRequest {
        /// Why the request was refused.
        reason: String,
    },

    /// Connection refused, TLS failure or a broken body.
    #[error("backend unreachable: {reason}")]
    Transport {
        /// Underlying I/O or protocol message.
        reason: String,
    },

    /// The provider did not answer within the configured deadline.
    #[error("adapter request timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// HTTP 429 from the provider.
    #[error("backend rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Parsed `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// The provider answered with an explicit error or an unreadable envelope.
    #[error("adapter response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl AdapterError {
    /// Shorthand for [`AdapterError::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AdapterError::Configuration`].
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AdapterError::Transport`].
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AdapterError::Response`].
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }

    /// Returns `true` for failures where repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

/// Provider and model names, used for log fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterMetadata {
    provider: &'static str,
    model: String,
}

impl AdapterMetadata {
    /// Describes `model` served by `provider`.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Short provider name such as `gemini`.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Model identifier sent to the provider.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Shape the caller expects the completion text to take.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Unconstrained text.
    #[default]
    Text,
    /// A single JSON object; adapters enable the provider's JSON mode.
    Json,
}

/// Single-turn generation request.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GenerationRequest {
    /// Sent as Gemini `systemInstruction` or a leading `system` chat message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instruction: Option<String>,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(default)]
    response_format: ResponseFormat,
}

impl GenerationRequest {
    /// Creates a request for the rendered prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] if the prompt is blank.
    pub fn new(prompt: impl Into<String>) -> AdapterResult<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(AdapterError::invalid_request("prompt must not be blank"));
        }
        Ok(Self {
            instruction: None,
            prompt,
            max_output_tokens: None,
            temperature: None,
            response_format: ResponseFormat::Text,
        })
    }

    /// Sets the system instruction.
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Caps the number of generated tokens.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Requests a particular response format.
    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// System instruction, if any.
    #[must_use]
    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// The user prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Token cap, if any.
    #[must_use]
    pub const fn max_output_tokens(&self) -> Option<u32> {
        self.max_output_tokens
    }

    /// Sampling temperature, if any.
    #[must_use]
    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Requested response format.
    #[must_use]
    pub const fn response_format(&self) -> ResponseFormat {
        self.response_format
    }
}

/// Why the provider stopped generating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer.
    #[default]
    Stop,
    /// The token cap cut the answer short.
    Length,
    /// A safety or content filter stopped generation.
    Filtered,
    /// Any reason the adapter does not recognise.
    Other,
}

impl FinishReason {
    /// Maps the provider vocabularies onto one enum; a missing reason
    /// counts as [`FinishReason::Stop`].
    ///
    /// Covers Gemini (`STOP`, `MAX_TOKENS`, `SAFETY`), `OpenAI` (`stop`,
    /// `length`, `content_filter`) and Ollama (`stop`, `length`).
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "" | "stop" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "safety" | "recitation" | "blocklist" | "prohibited_content" | "content_filter" => {
                Self::Filtered
            }
            _ => Self::Other,
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the instruction and prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the answer.
    pub output_tokens: u32,
}

/// A complete model answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    text: String,
    #[serde(default)]
    finish: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<TokenUsage>,
}

impl Completion {
    /// Creates a completion that finished normally.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish: FinishReason::Stop,
            usage: None,
        }
    }

    /// Records why generation stopped.
    #[must_use]
    pub const fn with_finish(mut self, finish: FinishReason) -> Self {
        self.finish = finish;
        self
    }

    /// Attaches token accounting.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Answer text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consumes the completion, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Why generation stopped.
    #[must_use]
    pub const fn finish(&self) -> FinishReason {
        self.finish
    }

    /// Token accounting, when the provider reports it.
    #[must_use]
    pub const fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// Returns `true` if the token cap cut the answer short.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.finish == FinishReason::Length
    }
}

/// A generation backend.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider and model of this instance.
    fn metadata(&self) -> &AdapterMetadata;

    /// Runs one generation to completion.
    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion>;
}
