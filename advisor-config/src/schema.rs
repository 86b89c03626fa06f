//! Strongly typed configuration schema.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvisorConfig {
    /// Generation backend selection.
    pub provider: ProviderConfig,
    /// Timeouts, concurrency and retry.
    pub runtime: RuntimeConfig,
    /// Plant identity used as a fixed flow input.
    pub plant: PlantConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Supported generation backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini `generateContent`.
    #[default]
    Gemini,
    /// `OpenAI` compatible chat completions.
    OpenAi,
    /// Local Ollama daemon.
    Ollama,
}

impl ProviderKind {
    /// Environment variable holding the API key, if the backend needs one.
    #[must_use]
    pub const fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        })
    }
}

/// `provider:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Backend to call.
    pub kind: ProviderKind,
    /// Model identifier passed to the backend.
    pub model: String,
    /// Override for the backend base URL.
    pub base_url: Option<String>,
    /// Environment variable to read the API key from.
    pub api_key_env: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Cap on generated tokens.
    pub max_output_tokens: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: "gemini-2.0-flash".to_owned(),
            base_url: None,
            api_key_env: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl ProviderConfig {
    /// The configured key variable, falling back to the backend default.
    #[must_use]
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }
}

/// `runtime:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Deadline for a single model call, in seconds.
    pub timeout_secs: u64,
    /// Model calls allowed in flight at once.
    pub max_concurrency: usize,
    /// Opt-in retry for transient failures.
    pub retry: RetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            max_concurrency: 8,
            retry: RetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Model call deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `runtime.retry:` section. One attempt means no retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 250,
        }
    }
}

impl RetryConfig {
    /// Returns `true` when more than one attempt is allowed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// `plant:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlantConfig {
    /// Display name of the plant.
    pub name: String,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            name: "JK Cement - Mangrol Plant".to_owned(),
        }
    }
}

/// `logging:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// Include the event target in log lines.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            with_target: false,
        }
    }
}
