//! Immutable flow definitions.

use std::fmt;

use advisor_primitives::{Contract, FlowId, Record};
use advisor_prompts::{PromptTemplate, TemplateError};
use thiserror::Error;

/// Extra check applied to an output record after contract validation.
///
/// Returning `Err` marks the model output as malformed; the message is kept
/// for operator logs only.
pub type OutputCheck = fn(&Record) -> Result<(), String>;

/// Errors raised while assembling a [`FlowDefinition`].
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The template names a field the input contract does not declare.
    #[error("flow `{flow}`: placeholder `{name}` is not an input field")]
    UnknownPlaceholder {
        /// Flow being defined.
        flow: FlowId,
        /// Offending placeholder name.
        name: String,
    },

    /// The template text could not be parsed.
    #[error("flow `{flow}`: {source}")]
    Template {
        /// Flow being defined.
        flow: FlowId,
        /// Parser error.
        #[source]
        source: TemplateError,
    },
}

/// Result alias for definition construction.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// One business capability: contracts, prompt template and formatting notes.
///
/// Definitions are checked when built and never change afterwards, so a
/// single instance can be shared by every request.
#[derive(Clone)]
pub struct FlowDefinition {
    id: FlowId,
    title: String,
    input: Contract,
    output: Contract,
    template: PromptTemplate,
    format_instructions: Option<String>,
    output_check: Option<OutputCheck>,
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("has_output_check", &self.output_check.is_some())
            .finish_non_exhaustive()
    }
}

impl FlowDefinition {
    /// Starts building a definition.
    #[must_use]
    pub fn builder(id: FlowId, input: Contract, output: Contract) -> FlowDefinitionBuilder {
        FlowDefinitionBuilder {
            id,
            title: None,
            input,
            output,
            format_instructions: None,
            output_check: None,
        }
    }

    /// Returns the capability identifier.
    #[must_use]
    pub const fn id(&self) -> &FlowId {
        &self.id
    }

    /// Human readable name of the capability.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Contract every input record must satisfy.
    #[must_use]
    pub const fn input(&self) -> &Contract {
        &self.input
    }

    /// Contract every successful output satisfies.
    #[must_use]
    pub const fn output(&self) -> &Contract {
        &self.output
    }

    /// The parsed prompt template.
    #[must_use]
    pub const fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Literal formatting notes appended after the rendered template.
    #[must_use]
    pub fn format_instructions(&self) -> Option<&str> {
        self.format_instructions.as_deref()
    }

    /// Renders the final prompt for a validated input record.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnresolvedPlaceholder`] if the record lacks a
    /// value the template needs.
    pub fn prompt(&self, input: &Record) -> Result<String, TemplateError> {
        let mut prompt = self.template.render(input)?;
        if let Some(instructions) = &self.format_instructions {
            prompt.push_str("\n\n");
            prompt.push_str(instructions);
        }
        Ok(prompt)
    }

    /// Runs the optional output check.
    pub(crate) fn check_output(&self, output: &Record) -> Result<(), String> {
        self.output_check.map_or(Ok(()), |check| check(output))
    }
}

/// Builder for [`FlowDefinition`].
#[derive(Debug)]
pub struct FlowDefinitionBuilder {
    id: FlowId,
    title: Option<String>,
    input: Contract,
    output: Contract,
    format_instructions: Option<String>,
    output_check: Option<OutputCheck>,
}

impl FlowDefinitionBuilder {
    /// Sets the display title. Defaults to the flow id.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends literal output formatting notes to every prompt.
    #[must_use]
    pub fn format_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.format_instructions = Some(instructions.into());
        self
    }

    /// Installs a post-validation check on output records.
    #[must_use]
    pub fn output_check(mut self, check: OutputCheck) -> Self {
        self.output_check = Some(check);
        self
    }

    /// Parses the template and checks every placeholder against the input
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Template`] for unparsable templates and
    /// [`DefinitionError::UnknownPlaceholder`] when a placeholder names a field
    /// missing from the input contract.
    pub fn template(self, source: impl Into<String>) -> DefinitionResult<FlowDefinition> {
        let template = PromptTemplate::parse(source).map_err(|source| DefinitionError::Template {
            flow: self.id.clone(),
            source,
        })?;

        if let Some(name) = template
            .placeholders()
            .into_iter()
            .find(|name| !self.input.contains(name))
        {
            return Err(DefinitionError::UnknownPlaceholder {
                flow: self.id,
                name: name.to_owned(),
            });
        }

        Ok(FlowDefinition {
            title: self.title.unwrap_or_else(|| self.id.to_string()),
            id: self.id,
            input: self.input,
            output: self.output,
            template,
            format_instructions: self.format_instructions,
            output_check: self.output_check,
        })
    }
}
