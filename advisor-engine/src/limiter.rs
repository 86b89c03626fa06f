//! Bounded admission for model calls.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const DEFAULT_MAX_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(8) {
    Some(value) => value,
    None => unreachable!(),
};

/// Maximum number of model calls allowed in flight at once.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    max_concurrency: NonZeroUsize,
}

impl LimiterConfig {
    /// Allows `max_concurrency` model calls in flight.
    #[must_use]
    pub const fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    /// Permit count.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

/// Semaphore shared by every run; each model call holds one permit.
///
/// Cloning is cheap and all clones share the same permits. A permit is
/// returned when the holding future completes or is dropped.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    config: LimiterConfig,
}

impl ConcurrencyLimiter {
    /// Constructs a limiter using the provided configuration.
    #[must_use]
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency().get())),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Settings this limiter was built with.
    #[must_use]
    pub const fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns `true` if the limiter has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the limiter; waiting and future acquisitions fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
    }

    /// Waits for a permit.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Closed`] if the limiter is closed before or
    /// while waiting.
    pub async fn acquire(&self) -> LimiterResult<OwnedSemaphorePermit> {
        if self.is_closed() {
            return Err(LimiterError::Closed);
        }
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

/// Errors produced by the limiter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimiterError {
    /// Limiter is closed and admits no further calls.
    #[error("concurrency limiter closed")]
    Closed,
}

/// Result alias for limiter operations.
pub type LimiterResult<T> = Result<T, LimiterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn in_flight_calls_never_exceed_permits() {
        let limiter = ConcurrencyLimiter::new(LimiterConfig::new(NonZeroUsize::new(2).unwrap()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn close_rejects_acquisition() {
        let limiter = ConcurrencyLimiter::default();
        limiter.close();
        assert_eq!(limiter.acquire().await.unwrap_err(), LimiterError::Closed);
    }

    #[tokio::test]
    async fn dropped_permit_is_returned() {
        let limiter = ConcurrencyLimiter::new(LimiterConfig::new(NonZeroUsize::new(1).unwrap()));
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        drop(permit);
        assert_eq!(limiter.available(), 1);
    }
}
