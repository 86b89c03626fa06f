//! Connection settings shared by every backend.

use std::env;
use std::time::Duration;

use hyper::header::HeaderValue;

use crate::http_client::sanitize_base_url;
use crate::traits::{AdapterError, AdapterResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Model, credentials and endpoint for one backend.
#[derive(Clone)]
pub struct AdapterConfig {
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("default_temperature", &self.default_temperature)
            .finish()
    }
}

impl AdapterConfig {
    /// Settings for `model` with the provider's default endpoint.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            default_temperature: None,
        }
    }

    /// Reads the API key from `var`; unset or blank leaves it absent.
    #[must_use]
    pub fn with_api_key_from_env(mut self, var: &str) -> Self {
        self.api_key = env::var(var).ok().filter(|key| !key.trim().is_empty());
        self
    }

    /// Supplies the API key directly.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Points the adapter at a gateway or self-hosted endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if `base_url` is not an
    /// absolute `http`/`https` URL.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = Some(sanitize_base_url(base_url.as_ref())?);
        Ok(self)
    }

    /// Deadline for one HTTP exchange.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Temperature used when a request does not set one.
    #[must_use]
    pub const fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// HTTP deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fallback temperature.
    #[must_use]
    pub const fn default_temperature(&self) -> Option<f32> {
        self.default_temperature
    }

    pub(crate) fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }

    /// Builds a sensitive header value from the key, formatted by `render`.
    pub(crate) fn api_key_header(
        &self,
        provider: &str,
        render: impl FnOnce(&str) -> String,
    ) -> AdapterResult<HeaderValue> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AdapterError::configuration(format!("{provider} adapter requires an API key"))
        })?;
        let mut value = HeaderValue::from_str(&render(key)).map_err(|_| {
            AdapterError::configuration(format!("{provider} API key contains invalid bytes"))
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_env_key_counts_as_missing() {
        let config = AdapterConfig::new("m").with_api_key_from_env("ADVISOR_ADAPTERS_TEST_UNSET");
        let err = config.api_key_header("Gemini", str::to_owned).unwrap_err();
        assert!(err.to_string().contains("Gemini adapter requires an API key"));
    }

    #[test]
    fn key_is_redacted_in_debug() {
        let config = AdapterConfig::new("m").with_api_key("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
        let header = config
            .api_key_header("OpenAI", |key| format!("Bearer {key}"))
            .unwrap();
        assert!(header.is_sensitive());
    }

    #[test]
    fn base_url_override_wins() {
        let config = AdapterConfig::new("m")
            .with_base_url("https://gateway.internal/llm")
            .unwrap();
        assert_eq!(
            config.base_url_or("https://api.openai.com/"),
            "https://gateway.internal/llm/"
        );
        assert_eq!(
            AdapterConfig::new("m").base_url_or("http://127.0.0.1:11434/"),
            "http://127.0.0.1:11434/"
        );
    }
}
