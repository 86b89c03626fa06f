//! Opt-in retry decorator for model adapters.
//!
//! Flow execution never retries on its own; deployments that want retries wrap
//! their adapter in [`RetryingAdapter`] before handing it to the engine.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, GenerationRequest, ModelAdapter,
};

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` total attempts.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff: Duration::from_secs(10),
        }
    }

    /// Caps the delay between attempts.
    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Total number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Adapter decorator that retries transient failures.
///
/// Only errors for which [`AdapterError::is_retryable`] holds are
/// retried; a provider's `Retry-After` hint replaces the computed backoff.
pub struct RetryingAdapter {
    inner: Arc<dyn ModelAdapter>,
    policy: RetryPolicy,
}

impl RetryingAdapter {
    /// Wraps an adapter with the supplied policy.
    #[must_use]
    pub fn new(inner: Arc<dyn ModelAdapter>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl ModelAdapter for RetryingAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        self.inner.metadata()
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        let max_attempts = self.policy.max_attempts.get();
        let mut attempt = 1;
        loop {
            match self.inner.generate(request.clone()).await {
                Ok(completion) => return Ok(completion),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = match &err {
                        AdapterError::RateLimited {
                            retry_after: Some(hint),
                        } => (*hint).min(self.policy.max_backoff),
                        _ => self.policy.backoff(attempt),
                    };
                    warn!(
                        provider = self.inner.metadata().provider(),
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %err,
                        "retrying model call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        metadata: AdapterMetadata,
        failures: u32,
        calls: AtomicU32,
        permanent: bool,
    }

    impl FlakyAdapter {
        fn new(failures: u32, permanent: bool) -> Self {
            Self {
                metadata: AdapterMetadata::new("test", "flaky"),
                failures,
                calls: AtomicU32::new(0),
                permanent,
            }
        }
    }

    #[async_trait]
    impl ModelAdapter for FlakyAdapter {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn generate(&self, _request: GenerationRequest) -> AdapterResult<Completion> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.permanent {
                return Err(AdapterError::response("400 bad request"));
            }
            if call <= self.failures {
                return Err(AdapterError::transport("connection reset"));
            }
            Ok(Completion::new("ok"))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("hi").unwrap()
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(NonZeroU32::new(attempts).unwrap(), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let flaky = Arc::new(FlakyAdapter::new(2, false));
        let adapter = RetryingAdapter::new(flaky.clone(), policy(3));

        let completion = adapter
            .generate(request())
            .await
            .expect("third attempt succeeds");
        assert_eq!(completion.text(), "ok");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyAdapter::new(5, false));
        let adapter = RetryingAdapter::new(flaky.clone(), policy(2));

        let result = adapter.generate(request()).await;
        assert!(matches!(result, Err(AdapterError::Transport { .. })));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_provider_errors() {
        let flaky = Arc::new(FlakyAdapter::new(0, true));
        let adapter = RetryingAdapter::new(flaky.clone(), policy(4));

        let result = adapter.generate(request()).await;
        assert!(matches!(result, Err(AdapterError::Response { .. })));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(NonZeroU32::new(5).unwrap(), Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(300));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
    }
}
