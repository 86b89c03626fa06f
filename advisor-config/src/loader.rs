//! Loading and validation of [`AdvisorConfig`] documents.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::schema::AdvisorConfig;

const MAX_TIMEOUT_SECS: u64 = 600;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid YAML for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A value is outside its allowed range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl AdvisorConfig {
    /// Reads, parses and validates a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, malformed, or
    /// fails [`AdvisorConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), provider = %config.provider.kind, "loaded config");
        Ok(config)
    }

    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // An empty document deserialises as null rather than an empty map.
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model must not be empty".into()));
        }
        if let Some(temperature) = self.provider.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "provider.temperature must be within 0.0..=2.0, got {temperature}"
                )));
            }
        }
        if self.provider.max_output_tokens == Some(0) {
            return Err(ConfigError::Invalid(
                "provider.max_output_tokens must be greater than 0".into(),
            ));
        }

        let runtime = &self.runtime;
        if !(1..=MAX_TIMEOUT_SECS).contains(&runtime.timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "runtime.timeout_secs must be within 1..={MAX_TIMEOUT_SECS}, got {}",
                runtime.timeout_secs
            )));
        }
        if runtime.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "runtime.max_concurrency must be greater than 0".into(),
            ));
        }
        if runtime.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "runtime.retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.plant.name.trim().is_empty() {
            return Err(ConfigError::Invalid("plant.name must not be empty".into()));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::schema::ProviderKind;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AdvisorConfig::from_yaml_str("").unwrap();
        assert_eq!(config, AdvisorConfig::default());
        assert_eq!(config.provider.kind, ProviderKind::Gemini);
        assert_eq!(config.provider.model, "gemini-2.0-flash");
        assert_eq!(config.provider.api_key_env(), Some("GEMINI_API_KEY"));
        assert_eq!(config.runtime.timeout(), Duration::from_secs(45));
        assert_eq!(config.runtime.max_concurrency, 8);
        assert!(!config.runtime.retry.is_enabled());
        assert_eq!(config.plant.name, "JK Cement - Mangrol Plant");
        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.with_target);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r"
provider:
  kind: openai
  model: gpt-4o-mini
  temperature: 0.2
runtime:
  retry:
    max_attempts: 3
plant:
  name: Test Works
";
        let config = AdvisorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.provider.api_key_env(), Some("OPENAI_API_KEY"));
        assert_eq!(config.provider.temperature, Some(0.2));
        assert_eq!(config.runtime.timeout_secs, 45);
        assert!(config.runtime.retry.is_enabled());
        assert_eq!(config.runtime.retry.initial_backoff(), Duration::from_millis(250));
        assert_eq!(config.plant.name, "Test Works");
    }

    #[test]
    fn explicit_key_env_overrides_provider_default() {
        let yaml = "provider:\n  kind: ollama\n  model: llama3.1\n  api_key_env: PROXY_TOKEN\n";
        let config = AdvisorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.provider.api_key_env(), Some("PROXY_TOKEN"));

        let ollama = AdvisorConfig::from_yaml_str("provider:\n  kind: ollama\n").unwrap();
        assert_eq!(ollama.provider.api_key_env(), None);
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        for yaml in [
            "runtime:\n  timeout_secs: 0\n",
            "runtime:\n  timeout_secs: 601\n",
            "runtime:\n  max_concurrency: 0\n",
            "runtime:\n  retry:\n    max_attempts: 0\n",
            "provider:\n  temperature: 3.5\n",
            "plant:\n  name: '  '\n",
        ] {
            let err = AdvisorConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}: {err}");
        }
    }

    #[test]
    fn unknown_keys_and_providers_fail_to_parse() {
        let err = AdvisorConfig::from_yaml_str("runtime:\n  timeout: 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = AdvisorConfig::from_yaml_str("provider:\n  kind: bard\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("advisor-config-{}.yaml", std::process::id()));
        fs::write(&path, "runtime:\n  max_concurrency: 2\n").unwrap();
        let config = AdvisorConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.runtime.max_concurrency, 2);

        let missing = AdvisorConfig::load(path.with_extension("absent")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
