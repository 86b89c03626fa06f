//! In-process adapters used by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use advisor_adapters::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, GenerationRequest, ModelAdapter,
};
use async_trait::async_trait;

/// Answers every request with the same text.
pub(crate) struct StaticAdapter {
    metadata: AdapterMetadata,
    response: String,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl StaticAdapter {
    pub(crate) fn new(response: impl Into<String>) -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "static"),
            response: response.into(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelAdapter for StaticAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        Ok(Completion::new(self.response.clone()))
    }
}

/// Fails every request with a fixed adapter error.
pub(crate) struct FailingAdapter {
    metadata: AdapterMetadata,
    make: fn(&str) -> AdapterError,
    reason: &'static str,
}

impl FailingAdapter {
    pub(crate) fn transport(reason: &'static str) -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "failing"),
            make: |reason| AdapterError::transport(reason),
            reason,
        }
    }

    pub(crate) fn response(reason: &'static str) -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "failing"),
            make: |reason| AdapterError::response(reason),
            reason,
        }
    }
}

#[async_trait]
impl ModelAdapter for FailingAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, _request: GenerationRequest) -> AdapterResult<Completion> {
        Err((self.make)(self.reason))
    }
}

/// Never settles; records whether the pending call was dropped.
pub(crate) struct PendingAdapter {
    metadata: AdapterMetadata,
    started: AtomicUsize,
    dropped: Arc<AtomicBool>,
}

impl PendingAdapter {
    pub(crate) fn new() -> Self {
        Self {
            metadata: AdapterMetadata::new("test", "pending"),
            started: AtomicUsize::new(0),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelAdapter for PendingAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, _request: GenerationRequest) -> AdapterResult<Completion> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _flag = DropFlag(Arc::clone(&self.dropped));
        std::future::pending::<()>().await;
        Err(AdapterError::transport("unreachable"))
    }
}
