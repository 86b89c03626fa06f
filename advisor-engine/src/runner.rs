//! Flow orchestration: validate, render, invoke, validate again.

use std::time::{Duration, Instant};

use advisor_primitives::{InvocationId, Record};
use tracing::{Instrument, debug, error, info, info_span};

use crate::definition::FlowDefinition;
use crate::error::{FlowError, InvocationResult};
use crate::invoker::ModelInvoker;
use crate::lifecycle::{RunEvent, RunLifecycle};
use crate::limiter::ConcurrencyLimiter;

/// Default deadline for the model call of a single run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Generic executor shared by every flow.
///
/// A runner holds no per-request state, so one instance serves all
/// concurrent runs. Dropping the future returned by [`FlowRunner::run`]
/// cancels the in-flight model call and frees its concurrency permit.
#[derive(Debug, Clone)]
pub struct FlowRunner {
    invoker: ModelInvoker,
    limiter: ConcurrencyLimiter,
    timeout: Duration,
}

impl FlowRunner {
    /// Creates a runner with the default limiter and timeout.
    #[must_use]
    pub fn new(invoker: ModelInvoker) -> Self {
        Self {
            invoker,
            limiter: ConcurrencyLimiter::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replaces the concurrency limiter.
    #[must_use]
    pub fn with_limiter(mut self, limiter: ConcurrencyLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Sets the deadline for the model call step.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the shared limiter.
    #[must_use]
    pub const fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Returns the model invoker.
    #[must_use]
    pub const fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    /// Runs `definition` against `input`.
    ///
    /// A successful result holds exactly the fields of the output contract,
    /// each with its declared kind.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] without calling the model when
    /// `input` fails the input contract; other variants are described on
    /// [`FlowError`].
    pub async fn run(&self, definition: &FlowDefinition, input: &Record) -> InvocationResult {
        let invocation_id = InvocationId::random();
        let span = info_span!("flow_run", flow = %definition.id(), %invocation_id);
        self.execute(definition, input, invocation_id)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        definition: &FlowDefinition,
        input: &Record,
        invocation_id: InvocationId,
    ) -> InvocationResult {
        let started = Instant::now();
        let mut run = RunLifecycle::new(invocation_id);

        let outcome = self.steps(definition, input, &mut run).await;
        match &outcome {
            Ok(_) => {
                advance(&mut run, RunEvent::Complete);
                info!(elapsed_ms = elapsed_ms(started), "flow run completed");
            }
            Err(err) => {
                advance(&mut run, RunEvent::Fail);
                debug!(
                    kind = %err.kind(),
                    elapsed_ms = elapsed_ms(started),
                    "flow run failed"
                );
            }
        }
        outcome
    }

    async fn steps(
        &self,
        definition: &FlowDefinition,
        input: &Record,
        run: &mut RunLifecycle,
    ) -> InvocationResult {
        advance(run, RunEvent::Validate);
        let input = definition
            .input()
            .validate(input)
            .map_err(FlowError::InvalidInput)?;

        advance(run, RunEvent::Render);
        let prompt = definition.prompt(&input)?;

        advance(run, RunEvent::Invoke);
        let response = self.call_model(definition, &prompt).await?;

        advance(run, RunEvent::ReceiveOutput);
        let output = self.invoker.coerce(&response, definition.output())?;
        definition
            .check_output(&output)
            .map_err(FlowError::malformed)?;
        Ok(output)
    }

    async fn call_model(
        &self,
        definition: &FlowDefinition,
        prompt: &str,
    ) -> Result<String, FlowError> {
        let call = async {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|err| FlowError::ServiceUnavailable {
                    reason: err.to_string(),
                })?;
            self.invoker.generate(prompt, definition.output()).await
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(FlowError::Timeout {
                after: self.timeout,
            }))
    }
}

fn advance(run: &mut RunLifecycle, event: RunEvent) {
    if let Err(err) = run.transition(event) {
        error!(%err, "flow run state machine rejected transition");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
