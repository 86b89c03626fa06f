//! Boundary between submitted forms and flow runs.
//!
//! [`ActionHandler::handle`] turns a flat form into an input record, refuses
//! incomplete forms before any model call, and maps the run outcome into a
//! [`PresentationState`]. Failure details go to the log, never to the user.

use std::collections::BTreeMap;
use std::sync::Arc;

use advisor_engine::{FailureKind, FlowDefinition, FlowError, FlowRegistry, FlowRunner};
use advisor_primitives::Record;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::catalog::{
    ALTERNATIVE_FUEL, COMBUSTION, CatalogError, CatalogResult, PLANT_SUMMARY, QUALITY_CORRECTION,
    RAW_MATERIAL_BLEND, UTILITIES_LOGISTICS,
};

/// Untyped form submission: field name to raw text.
pub type FormData = BTreeMap<String, String>;

/// Shown when a required form field is missing or blank.
pub const REQUIRED_FIELDS_MESSAGE: &str = "All fields are required.";
/// Shown when a field is present but cannot be used as submitted.
pub const INVALID_FIELDS_MESSAGE: &str = "Some fields have invalid values.";
/// Shown when the model call exceeded its deadline.
pub const TIMEOUT_MESSAGE: &str = "The analysis timed out. Please try again.";

/// Result object consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationState {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Record>,
    #[serde(default, skip_serializing_if = "is_false")]
    error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(flag: &bool) -> bool {
    !*flag
}

impl PresentationState {
    /// Successful outcome carrying the output record.
    #[must_use]
    pub fn success(message: impl Into<String>, data: Record) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            error: false,
        }
    }

    /// User-visible failure.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            error: true,
        }
    }

    /// Message to display.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Output record, present only on success.
    #[must_use]
    pub const fn data(&self) -> Option<&Record> {
        self.data.as_ref()
    }

    /// Returns `true` if the message describes a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error
    }
}

/// A flow together with its user-facing messages and preset inputs.
#[derive(Debug, Clone)]
pub struct FlowAction {
    definition: Arc<FlowDefinition>,
    success_message: String,
    failure_message: String,
    presets: Record,
}

impl FlowAction {
    /// Wraps a definition with its messages.
    #[must_use]
    pub fn new(
        definition: Arc<FlowDefinition>,
        success_message: impl Into<String>,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            success_message: success_message.into(),
            failure_message: failure_message.into(),
            presets: Record::new(),
        }
    }

    /// Adds a fixed input used when the form does not supply one.
    #[must_use]
    pub fn with_preset(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.presets.insert(field, value.into());
        self
    }

    /// The wrapped definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<FlowDefinition> {
        &self.definition
    }

    /// Message shown on success.
    #[must_use]
    pub fn success_message(&self) -> &str {
        &self.success_message
    }

    /// Generic message shown on failure.
    #[must_use]
    pub fn failure_message(&self) -> &str {
        &self.failure_message
    }

    /// Preset inputs.
    #[must_use]
    pub const fn presets(&self) -> &Record {
        &self.presets
    }

    /// Input fields a form is expected to provide, excluding presets.
    pub fn form_fields(&self) -> impl Iterator<Item = &str> {
        self.definition
            .input()
            .fields()
            .iter()
            .map(advisor_primitives::FieldSpec::name)
            .filter(|name| !self.presets.contains(name))
    }

    /// Builds the input record: form values win, presets fill the gaps, and
    /// fields outside the input contract are dropped.
    fn input_from(&self, form: &FormData) -> Record {
        let mut record = Record::new();
        for spec in self.definition.input().fields() {
            let submitted = form
                .get(spec.name())
                .filter(|value| !value.trim().is_empty())
                .map(|value| serde_json::Value::String(value.clone()));
            if let Some(value) = submitted.or_else(|| self.presets.get(spec.name()).cloned()) {
                record.insert(spec.name(), value);
            }
        }
        record
    }
}

/// The six capabilities keyed by flow id.
#[derive(Debug, Clone)]
pub struct ActionSet {
    actions: Vec<FlowAction>,
}

impl ActionSet {
    /// Wires every catalog flow to its messages; `plant_name` fills the
    /// utilities flow's `plantName` input.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MissingFlow`] if `registry` lacks one of the
    /// standard flows.
    pub fn standard(registry: &FlowRegistry, plant_name: &str) -> CatalogResult<Self> {
        const OPTIMIZED: &str = "Optimization successful.";
        const OPTIMIZE_FAILED: &str = "An error occurred during optimization.";

        let lookup = |id: &str| {
            registry
                .get(id)
                .map(Arc::clone)
                .ok_or_else(|| CatalogError::MissingFlow { id: id.to_owned() })
        };

        let actions = vec![
            FlowAction::new(
                lookup(PLANT_SUMMARY)?,
                "Report generated successfully.",
                "An error occurred while generating the report.",
            ),
            FlowAction::new(lookup(RAW_MATERIAL_BLEND)?, OPTIMIZED, OPTIMIZE_FAILED),
            FlowAction::new(lookup(COMBUSTION)?, OPTIMIZED, OPTIMIZE_FAILED),
            FlowAction::new(
                lookup(QUALITY_CORRECTION)?,
                "Analysis complete.",
                "An error occurred during analysis.",
            ),
            FlowAction::new(lookup(ALTERNATIVE_FUEL)?, OPTIMIZED, OPTIMIZE_FAILED),
            FlowAction::new(lookup(UTILITIES_LOGISTICS)?, OPTIMIZED, OPTIMIZE_FAILED)
                .with_preset("plantName", plant_name),
        ];
        Ok(Self { actions })
    }

    /// Looks up an action by flow id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FlowAction> {
        self.actions
            .iter()
            .find(|action| action.definition.id().as_str() == id)
    }

    /// Iterates actions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &FlowAction> {
        self.actions.iter()
    }
}

/// Executes form submissions against a shared [`FlowRunner`].
#[derive(Debug, Clone)]
pub struct ActionHandler {
    runner: FlowRunner,
}

impl ActionHandler {
    /// Creates a handler.
    #[must_use]
    pub const fn new(runner: FlowRunner) -> Self {
        Self { runner }
    }

    /// The runner used for submissions.
    #[must_use]
    pub const fn runner(&self) -> &FlowRunner {
        &self.runner
    }

    /// Runs `action` for a submitted form.
    pub async fn handle(&self, form: &FormData, action: &FlowAction) -> PresentationState {
        let flow = action.definition.id();
        let input = action.input_from(form);

        let missing: Vec<&str> = action
            .definition
            .input()
            .required_fields()
            .filter(|field| !input.contains(field))
            .collect();
        if !missing.is_empty() {
            info!(%flow, ?missing, "form rejected before model call");
            return PresentationState::failure(REQUIRED_FIELDS_MESSAGE);
        }

        match self.runner.run(&action.definition, &input).await {
            Ok(output) => PresentationState::success(action.success_message.clone(), output),
            Err(err) => {
                let kind = err.kind();
                log_failure(flow.as_str(), kind, &err);
                PresentationState::failure(user_message(kind, action))
            }
        }
    }
}

fn log_failure(flow: &str, kind: FailureKind, err: &FlowError) {
    match kind {
        FailureKind::InvalidInput | FailureKind::ServiceUnavailable | FailureKind::Timeout => {
            warn!(flow, %kind, error = %err, "flow action failed");
        }
        FailureKind::TemplateError | FailureKind::ServiceError | FailureKind::MalformedOutput => {
            error!(flow, %kind, error = %err, "flow action failed");
        }
    }
}

fn user_message(kind: FailureKind, action: &FlowAction) -> String {
    match kind {
        FailureKind::InvalidInput => INVALID_FIELDS_MESSAGE.to_owned(),
        FailureKind::Timeout => TIMEOUT_MESSAGE.to_owned(),
        _ => action.failure_message.clone(),
    }
}
