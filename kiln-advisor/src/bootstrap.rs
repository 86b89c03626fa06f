//! Wiring from configuration to a ready-to-use [`Advisor`].

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use advisor_adapters::gemini::GeminiAdapter;
use advisor_adapters::ollama::OllamaAdapter;
use advisor_adapters::openai::OpenAiAdapter;
use advisor_adapters::retry::{RetryPolicy, RetryingAdapter};
use advisor_adapters::{AdapterConfig, AdapterError, ModelAdapter};
use advisor_config::{AdvisorConfig, ConfigError, ProviderConfig, ProviderKind, RetryConfig};
use advisor_engine::{ConcurrencyLimiter, FlowRegistry, FlowRunner, LimiterConfig, ModelInvoker};
use advisor_flows::{
    ActionHandler, ActionSet, CatalogError, FlowAction, FormData, PresentationState,
    shared_catalog,
};
use thiserror::Error;
use tracing::info;

/// Errors raised while assembling or addressing an [`Advisor`].
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The generation backend could not be constructed.
    #[error("failed to build {provider} adapter: {source}")]
    Adapter {
        /// Configured backend.
        provider: ProviderKind,
        /// Underlying adapter error.
        #[source]
        source: AdapterError,
    },
    /// The flow catalog could not be built.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// No flow with the requested id exists.
    #[error("unknown flow `{id}`")]
    UnknownFlow {
        /// Requested id.
        id: String,
    },
}

/// Result alias for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// The flow catalog wired to a generation backend.
#[derive(Debug, Clone)]
pub struct Advisor {
    registry: Arc<FlowRegistry>,
    actions: ActionSet,
    handler: ActionHandler,
}

impl Advisor {
    /// Builds the backend named by `config.provider` and wires it in.
    ///
    /// API keys are read from the environment variable named by the
    /// provider section.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when the configuration is invalid or the
    /// adapter cannot be constructed (for example a missing API key).
    pub fn from_config(config: &AdvisorConfig) -> BootstrapResult<Self> {
        config.validate()?;
        let adapter = build_adapter(&config.provider, config.runtime.timeout()).map_err(
            |source| BootstrapError::Adapter {
                provider: config.provider.kind,
                source,
            },
        )?;
        let adapter = with_retry(adapter, &config.runtime.retry);
        Self::with_adapter(adapter, config)
    }

    /// Wires an already constructed adapter using the remaining settings.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when the configuration is invalid or the
    /// catalog cannot be built.
    pub fn with_adapter(
        adapter: Arc<dyn ModelAdapter>,
        config: &AdvisorConfig,
    ) -> BootstrapResult<Self> {
        config.validate()?;

        let mut invoker = ModelInvoker::new(adapter);
        if let Some(temperature) = config.provider.temperature {
            invoker = invoker.with_temperature(temperature);
        }
        if let Some(tokens) = config.provider.max_output_tokens {
            invoker = invoker.with_max_output_tokens(tokens);
        }

        let max_concurrency = NonZeroUsize::new(config.runtime.max_concurrency).ok_or_else(|| {
            ConfigError::Invalid("runtime.max_concurrency must be greater than 0".into())
        })?;
        let runner = FlowRunner::new(invoker)
            .with_limiter(ConcurrencyLimiter::new(LimiterConfig::new(max_concurrency)))
            .with_timeout(config.runtime.timeout());

        let registry = shared_catalog()?;
        let actions = ActionSet::standard(&registry, &config.plant.name)?;
        info!(
            provider = %config.provider.kind,
            model = %config.provider.model,
            flows = registry.len(),
            "advisor ready"
        );

        Ok(Self {
            registry,
            actions,
            handler: ActionHandler::new(runner),
        })
    }

    /// Registered flow definitions.
    #[must_use]
    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    /// Capability actions in catalog order.
    #[must_use]
    pub const fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Looks up the action for `flow_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::UnknownFlow`] if no such flow exists.
    pub fn action(&self, flow_id: &str) -> BootstrapResult<&FlowAction> {
        self.actions
            .get(flow_id)
            .ok_or_else(|| BootstrapError::UnknownFlow {
                id: flow_id.to_owned(),
            })
    }

    /// Runs the flow `flow_id` for a submitted form.
    ///
    /// Run failures are reported inside the returned state; only an unknown
    /// flow id is an error.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::UnknownFlow`] if no such flow exists.
    pub async fn handle(
        &self,
        flow_id: &str,
        form: &FormData,
    ) -> BootstrapResult<PresentationState> {
        let action = self.action(flow_id)?;
        Ok(self.handler.handle(form, action).await)
    }
}

fn build_adapter(
    provider: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn ModelAdapter>, AdapterError> {
    let mut config = AdapterConfig::new(&provider.model).with_timeout(timeout);
    if let Some(var) = provider.api_key_env() {
        config = config.with_api_key_from_env(var);
    }
    if let Some(url) = &provider.base_url {
        config = config.with_base_url(url)?;
    }

    let adapter: Arc<dyn ModelAdapter> = match provider.kind {
        ProviderKind::Gemini => Arc::new(GeminiAdapter::new(&config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(&config)?),
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(&config)?),
    };
    Ok(adapter)
}

fn with_retry(adapter: Arc<dyn ModelAdapter>, retry: &RetryConfig) -> Arc<dyn ModelAdapter> {
    match NonZeroU32::new(retry.max_attempts) {
        Some(attempts) if retry.is_enabled() => Arc::new(RetryingAdapter::new(
            adapter,
            RetryPolicy::new(attempts, retry.initial_backoff()),
        )),
        _ => adapter,
    }
}
