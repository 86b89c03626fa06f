//! Failure taxonomy for flow invocations.

use std::fmt;
use std::time::Duration;

use advisor_adapters::traits::AdapterError;
use advisor_primitives::{Error as ContractError, Record};
use advisor_prompts::TemplateError;
use serde::Serialize;
use thiserror::Error;

/// Outcome of a flow run: a record satisfying the output contract, or a failure.
pub type InvocationResult = Result<Record, FlowError>;

/// Flat classification of [`FlowError`], suitable for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or malformed required input; no external call was made.
    InvalidInput,
    /// Template could not be rendered; a configuration defect.
    TemplateError,
    /// The generation service could not be reached.
    ServiceUnavailable,
    /// The generation service answered with an explicit error.
    ServiceError,
    /// The generation call exceeded its deadline.
    Timeout,
    /// The model's answer did not satisfy the output contract.
    MalformedOutput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidInput => "invalid_input",
            Self::TemplateError => "template_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::ServiceError => "service_error",
            Self::Timeout => "timeout",
            Self::MalformedOutput => "malformed_output",
        })
    }
}

/// Errors surfaced by flow execution.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Input record failed contract validation.
    #[error("invalid input: {0}")]
    InvalidInput(#[source] ContractError),

    /// Prompt rendering failed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Transport failure or no capacity to reach the service.
    #[error("generation service unavailable: {reason}")]
    ServiceUnavailable {
        /// Internal detail for operators.
        reason: String,
    },

    /// The provider returned an explicit error.
    #[error("generation service error: {reason}")]
    Service {
        /// Internal detail for operators.
        reason: String,
    },

    /// The generation call did not settle in time.
    #[error("generation timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The response could not be coerced into the output contract.
    #[error("malformed model output: {reason}")]
    MalformedOutput {
        /// What was wrong with the response.
        reason: String,
    },
}

impl FlowError {
    /// Returns the flat failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::Template(_) => FailureKind::TemplateError,
            Self::ServiceUnavailable { .. } => FailureKind::ServiceUnavailable,
            Self::Service { .. } => FailureKind::ServiceError,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::MalformedOutput { .. } => FailureKind::MalformedOutput,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
        }
    }
}

impl From<AdapterError> for FlowError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout { after } => Self::Timeout { after },
            AdapterError::Transport { .. } | AdapterError::Configuration { .. } => {
                Self::ServiceUnavailable {
                    reason: err.to_string(),
                }
            }
            AdapterError::RateLimited { .. }
            | AdapterError::Response { .. }
            | AdapterError::InvalidRequest { .. } => Self::Service {
                reason: err.to_string(),
            },
        }
    }
}
