//! Structured-output advisory flows for cement plant operations.
//!
//! The facade bundles the workspace crates and offers [`bootstrap::Advisor`],
//! which turns an [`config::AdvisorConfig`] into a ready-to-use set of flow
//! actions. Optional crates sit behind feature flags.

#![warn(missing_docs, clippy::pedantic)]

pub mod bootstrap;

pub use bootstrap::{Advisor, BootstrapError, BootstrapResult};

/// Schema contracts and records.
pub use advisor_primitives as primitives;

/// Generation backend adapters.
pub use advisor_adapters as adapters;

/// YAML configuration.
pub use advisor_config as config;

/// Flow definitions, invocation and orchestration.
pub use advisor_engine as engine;

/// The six plant capabilities and their form handling.
pub use advisor_flows as flows;

/// Prompt templates (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use advisor_prompts as prompts;

/// Log output setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use advisor_telemetry as telemetry;
