//! Boundary call to the generation service plus output coercion.

use std::fmt;
use std::sync::Arc;

use advisor_adapters::traits::{GenerationRequest, ModelAdapter, ResponseFormat};
use advisor_primitives::Contract;
use advisor_prompts::OutputDirective;
use tracing::{debug, warn};

use crate::error::{FlowError, InvocationResult};
use crate::payload::{self, Extraction};

/// Sends prompts to a [`ModelAdapter`] and turns the answer into a record that
/// satisfies an output contract.
///
/// The invoker never retries; wrap the adapter in
/// [`RetryingAdapter`](advisor_adapters::retry::RetryingAdapter) for that.
#[derive(Clone)]
pub struct ModelInvoker {
    adapter: Arc<dyn ModelAdapter>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("ModelInvoker")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl ModelInvoker {
    /// Creates an invoker backed by the supplied adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn ModelAdapter>) -> Self {
        Self {
            adapter,
            temperature: None,
            max_output_tokens: None,
        }
    }

    /// Sets the sampling temperature sent with every request.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps the number of generated tokens.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Returns the underlying adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn ModelAdapter> {
        &self.adapter
    }

    /// Sends `prompt` with a directive derived from `output` and validates the
    /// answer against it.
    ///
    /// # Errors
    ///
    /// * [`FlowError::ServiceUnavailable`] on transport failures.
    /// * [`FlowError::Service`] when the provider reports an error.
    /// * [`FlowError::Timeout`] when the adapter's deadline elapses.
    /// * [`FlowError::MalformedOutput`] when the answer does not satisfy `output`.
    pub async fn invoke(&self, prompt: &str, output: &Contract) -> InvocationResult {
        let response = self.generate(prompt, output).await?;
        self.coerce(&response, output)
    }

    /// Performs the model call and returns the raw response text.
    pub(crate) async fn generate(&self, prompt: &str, output: &Contract) -> Result<String, FlowError> {
        let directive = OutputDirective::for_contract(output);
        let mut request = GenerationRequest::new(prompt)?
            .with_instruction(directive.content())
            .with_response_format(ResponseFormat::Json);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(tokens) = self.max_output_tokens {
            request = request.with_max_output_tokens(tokens);
        }

        let completion = self.adapter.generate(request).await?;

        let metadata = self.adapter.metadata();
        let usage = completion.usage().unwrap_or_default();
        debug!(
            provider = metadata.provider(),
            model = metadata.model(),
            finish = ?completion.finish(),
            prompt_tokens = usage.prompt_tokens,
            output_tokens = usage.output_tokens,
            bytes = completion.text().len(),
            "model responded"
        );
        // A cut-off answer may still carry every field in labelled form.
        if completion.is_truncated() {
            warn!(
                provider = metadata.provider(),
                output_tokens = usage.output_tokens,
                "model answer hit the token cap"
            );
        }
        Ok(completion.into_text())
    }

    /// Extracts and validates an output record from response text.
    pub(crate) fn coerce(&self, response: &str, output: &Contract) -> InvocationResult {
        let Some((candidate, extraction)) = payload::extract(response, output) else {
            return Err(FlowError::malformed(
                "response contained none of the expected fields",
            ));
        };
        if extraction == Extraction::Labelled {
            warn!(
                provider = self.adapter.metadata().provider(),
                "model ignored the JSON directive; using labelled sections"
            );
        }

        output
            .validate(&candidate)
            .map_err(|err| FlowError::malformed(err.to_string()))
    }
}
