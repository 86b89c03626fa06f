//! Local Ollama daemon backend (`api/chat`, non-streaming).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::config::AdapterConfig;
use crate::http_client::{HyperClient, build_https_client, endpoint, post_json};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, FinishReason, GenerationRequest,
    ModelAdapter, ResponseFormat, TokenUsage,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434/";

/// Talks to an Ollama daemon; no credentials are sent.
pub struct OllamaAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Builds the adapter; the API key, if configured, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the endpoint is invalid.
    pub fn new(config: &AdapterConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: build_https_client(),
            endpoint: endpoint("Ollama", config.base_url_or(DEFAULT_BASE_URL), "api/chat")?,
            metadata: AdapterMetadata::new("ollama", config.model()),
            timeout: config.timeout(),
            default_temperature: config.default_temperature(),
        })
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = request.instruction() {
            messages.push(ChatMessage {
                role: "system",
                content: instruction,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt(),
        });

        let options = Options {
            temperature: request.temperature().or(self.default_temperature),
            num_predict: request.max_output_tokens(),
        };

        ChatRequest {
            model: self.metadata.model(),
            stream: false,
            messages,
            format: (request.response_format() == ResponseFormat::Json).then_some("json"),
            options: (options.temperature.is_some() || options.num_predict.is_some())
                .then_some(options),
        }
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        let body = serde_json::to_vec(&self.body(&request)).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Ollama request: {err}"))
        })?;
        let bytes = post_json(
            &self.client,
            "Ollama",
            self.endpoint.clone(),
            &[],
            body,
            self.timeout,
        )
        .await?;

        let reply: ChatReply = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode Ollama response: {err}"))
        })?;
        reply.into_completion()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

impl ChatReply {
    fn into_completion(self) -> AdapterResult<Completion> {
        if let Some(error) = self.error {
            return Err(AdapterError::response(error));
        }
        let content = self
            .message
            .map(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AdapterError::response("Ollama returned an empty message"))?;

        let mut completion = Completion::new(content).with_finish(FinishReason::from_provider(
            self.done_reason.as_deref().unwrap_or_default(),
        ));
        if let (Some(prompt_tokens), Some(output_tokens)) = (self.prompt_eval_count, self.eval_count)
        {
            completion = completion.with_usage(TokenUsage {
                prompt_tokens,
                output_tokens,
            });
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(config: AdapterConfig) -> OllamaAdapter {
        OllamaAdapter::new(&config).expect("adapter")
    }

    #[test]
    fn default_endpoint_is_local_daemon() {
        let adapter = adapter(AdapterConfig::new("llama3.1"));
        assert_eq!(adapter.endpoint.to_string(), "http://127.0.0.1:11434/api/chat");
    }

    #[test]
    fn json_request_with_system_instruction() {
        let adapter = adapter(AdapterConfig::new("llama3.1").with_default_temperature(0.1));
        let request = GenerationRequest::new("hello")
            .unwrap()
            .with_instruction("json only")
            .with_response_format(ResponseFormat::Json);

        let value = serde_json::to_value(adapter.body(&request)).unwrap();
        assert_eq!(value["model"], "llama3.1");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
        assert_eq!(value["format"], "json");
        assert!((value["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn options_omitted_without_sampling_settings() {
        let adapter = adapter(AdapterConfig::new("llama3.1"));
        let request = GenerationRequest::new("hello").unwrap();
        assert!(adapter.body(&request).options.is_none());
    }

    #[test]
    fn reply_reads_done_reason_and_counts() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"message":{"role":"assistant","content":"{\"a\":1}"},"done":true,
                "done_reason":"length","prompt_eval_count":30,"eval_count":64}"#,
        )
        .unwrap();
        let completion = reply.into_completion().unwrap();
        assert!(completion.is_truncated());
        assert_eq!(
            completion.usage(),
            Some(TokenUsage {
                prompt_tokens: 30,
                output_tokens: 64
            })
        );
    }

    #[test]
    fn daemon_error_is_a_response_error() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"error":"model \"llama9\" not found"}"#).unwrap();
        assert!(matches!(
            reply.into_completion(),
            Err(AdapterError::Response { .. })
        ));
    }
}
