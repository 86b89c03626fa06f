//! Prompt construction for advisory flows.
//!
//! [`template`] turns a template and an input record into the prompt text;
//! [`directive`] describes the expected output shape to the model.

#![warn(missing_docs, clippy::pedantic)]

pub mod directive;
pub mod template;

pub use directive::OutputDirective;
pub use template::{PromptTemplate, TemplateError, TemplateResult, render};
