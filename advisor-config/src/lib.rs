//! Configuration for the kiln advisor.
//!
//! Settings live in a single YAML document; every section and field has a
//! default, so an empty file is a valid configuration.
//!
//! ```
//! use advisor_config::{AdvisorConfig, ProviderKind};
//!
//! let config = AdvisorConfig::from_yaml_str("provider:\n  kind: ollama\n  model: llama3.1\n").unwrap();
//! assert_eq!(config.provider.kind, ProviderKind::Ollama);
//! assert_eq!(config.runtime.timeout_secs, 45);
//! ```

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigResult};
pub use schema::{
    AdvisorConfig, LoggingConfig, PlantConfig, ProviderConfig, ProviderKind, RetryConfig,
    RuntimeConfig,
};
