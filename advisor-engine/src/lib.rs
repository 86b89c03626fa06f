//! Structured flow execution engine.
//!
//! A [`FlowDefinition`] pairs an input and output contract with a prompt
//! template. [`FlowRunner`] executes a definition: it validates the input,
//! renders the prompt, calls the model through a [`ModelInvoker`] under a
//! timeout and a [`ConcurrencyLimiter`], and only returns records that satisfy
//! the output contract.

#![warn(missing_docs, clippy::pedantic)]

mod definition;
mod error;
mod invoker;
mod lifecycle;
mod limiter;
pub mod payload;
mod registry;
mod runner;

#[cfg(test)]
mod test_support;

pub use definition::{
    DefinitionError, DefinitionResult, FlowDefinition, FlowDefinitionBuilder, OutputCheck,
};
pub use error::{FailureKind, FlowError, InvocationResult};
pub use invoker::ModelInvoker;
pub use lifecycle::{LifecycleError, LifecycleResult, RunEvent, RunLifecycle, RunState};
pub use limiter::{ConcurrencyLimiter, LimiterConfig, LimiterError, LimiterResult};
pub use registry::{FlowRegistry, FlowRegistryBuilder, RegistryError, RegistryResult};
pub use runner::{DEFAULT_TIMEOUT, FlowRunner};
