//! Core shared types for structured advisory flows.
//!
//! A [`Contract`] describes the required shape of a [`Record`]; flows use one
//! contract for their input and another for the output they promise callers.

#![warn(missing_docs, clippy::pedantic)]

mod contract;
mod error;
mod flow_id;
mod ids;
mod record;

/// Field descriptors, contracts, and the validation entry point.
pub use contract::{Contract, ContractBuilder, FieldKind, FieldSpec};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Validated identifier of a registered flow.
pub use flow_id::FlowId;
/// Per-request invocation identifier used for log correlation.
pub use ids::InvocationId;
/// Flat field record exchanged between the flow stages.
pub use record::Record;
