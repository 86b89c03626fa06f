//! Shared error definitions for advisor primitives.

use thiserror::Error;
use uuid::Error as UuidError;

use crate::FieldKind;

/// Result alias used throughout the advisor crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or checking primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided invocation identifier could not be parsed.
    #[error("invalid invocation id: {source}")]
    InvalidInvocationId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Flow identifier failed validation.
    #[error("invalid flow id `{id}`: {reason}")]
    InvalidFlowId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Contract definition failed validation.
    #[error("invalid contract: {reason}")]
    InvalidContract {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A required field is absent from the record (or blank).
    #[error("missing required field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// A field is present but its value does not match the declared kind.
    #[error("field `{field}` must be a {expected}, found {found}")]
    WrongType {
        /// Name of the offending field.
        field: String,
        /// Kind declared by the contract.
        expected: FieldKind,
        /// Short description of the value actually supplied.
        found: &'static str,
    },
}

impl Error {
    /// Returns the name of the record field this error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::WrongType { field, .. } => Some(field),
            _ => None,
        }
    }
}
