//! Generation backend adapters used by the flow engine.
//!
//! [`gemini`], [`openai`] and [`ollama`] implement [`ModelAdapter`] over HTTPS
//! and share one [`AdapterConfig`]. [`retry`] offers an opt-in decorator for
//! transient failures.

#![warn(missing_docs, clippy::pedantic)]

pub mod config;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod traits;

mod http_client;

pub use config::AdapterConfig;
pub use traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, FinishReason, GenerationRequest,
    ModelAdapter, ResponseFormat, TokenUsage,
};
