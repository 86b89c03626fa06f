//! Google Gemini `generateContent` backend.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hyper::Uri;
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::AdapterConfig;
use crate::http_client::{HyperClient, build_https_client, endpoint, post_json};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, FinishReason, GenerationRequest,
    ModelAdapter, ResponseFormat, TokenUsage,
};

/// Variable read by [`GeminiAdapter::from_env`].
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Calls the Generative Language API with the key in `x-goog-api-key`.
pub struct GeminiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: HeaderValue,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for GeminiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiAdapter {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] without an API key or when the
    /// model name does not form a valid endpoint.
    pub fn new(config: &AdapterConfig) -> AdapterResult<Self> {
        let api_key = config.api_key_header("Gemini", str::to_owned)?;
        let path = format!("v1beta/models/{}:generateContent", config.model());
        Ok(Self {
            client: build_https_client(),
            endpoint: endpoint("Gemini", config.base_url_or(DEFAULT_BASE_URL), &path)?,
            metadata: AdapterMetadata::new("gemini", config.model()),
            api_key,
            timeout: config.timeout(),
            default_temperature: config.default_temperature(),
        })
    }

    /// Builds the adapter with the key from [`GEMINI_API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// See [`GeminiAdapter::new`].
    pub fn from_env(model: impl Into<String>) -> AdapterResult<Self> {
        Self::new(&AdapterConfig::new(model).with_api_key_from_env(GEMINI_API_KEY_ENV))
    }

    fn body(&self, request: &GenerationRequest) -> GenerateContent {
        GenerateContent {
            system_instruction: request.instruction().map(Content::text),
            contents: vec![Content {
                role: Some("user"),
                ..Content::text(request.prompt())
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature().or(self.default_temperature),
                max_output_tokens: request.max_output_tokens(),
                response_mime_type: (request.response_format() == ResponseFormat::Json)
                    .then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        let body = serde_json::to_vec(&self.body(&request)).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Gemini request: {err}"))
        })?;
        let headers = [(HeaderName::from_static(API_KEY_HEADER), self.api_key.clone())];
        let bytes = post_json(
            &self.client,
            "Gemini",
            self.endpoint.clone(),
            &headers,
            body,
            self.timeout,
        )
        .await?;

        let reply: GenerateContentReply = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode Gemini response: {err}"))
        })?;
        reply.into_completion()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_owned(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GenerateContentReply {
    fn into_completion(self) -> AdapterResult<Completion> {
        if let Some(reason) = self.prompt_feedback.and_then(|fb| fb.block_reason) {
            return Err(AdapterError::response(format!(
                "Gemini blocked the prompt: {reason}"
            )));
        }
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(AdapterError::response("Gemini returned no candidates"));
        };

        let text: String = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .map(|part| part.text)
            .collect();
        let raw_finish = candidate.finish_reason.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AdapterError::response(format!(
                "Gemini returned an empty candidate (finish reason: {})",
                if raw_finish.is_empty() { "unknown" } else { raw_finish.as_str() }
            )));
        }

        let mut completion =
            Completion::new(text).with_finish(FinishReason::from_provider(&raw_finish));
        if let Some(usage) = self.usage_metadata {
            completion = completion.with_usage(TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            });
        }
        Ok(completion)
    }
}
