//! Cement plant advisory flows.
//!
//! [`catalog`] builds the registry of the six capabilities, and
//! [`ActionHandler`] is the entry point for submitted forms.

#![warn(missing_docs, clippy::pedantic)]

pub mod actions;
pub mod catalog;
pub mod samples;

pub use actions::{ActionHandler, ActionSet, FlowAction, FormData, PresentationState};
pub use catalog::{CatalogError, CatalogResult, catalog, shared_catalog};
pub use samples::{DEFAULT_PLANT_NAME, sample_form};
