//! Provider retry: bounded exponential backoff for transient failures.
//!
//! Wraps any provider and re-issues a request when it fails with a rate limit,
//! timeout, network error, or 5xx. Authentication and request-shape errors are
//! returned immediately. A policy with `max_retries == 0` is a pass-through.

use async_trait::async_trait;
use issuespilot_core::error::ProviderError;
use issuespilot_core::provider::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including `Retry-After` hints.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), honouring a provider hint.
    pub fn delay_for(&self, retry: u32, error: &ProviderError) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);

        match error {
            ProviderError::RateLimited { retry_after_secs } => backoff
                .max(Duration::from_secs(*retry_after_secs))
                .min(self.max_delay),
            _ => backoff,
        }
    }
}

/// A provider that retries transient failures of an inner provider.
pub struct RetryingProvider {
    inner: Arc<dyn issuespilot_core::Provider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn issuespilot_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
        T: Send,
    {
        let total = self.policy.max_retries + 1;
        let mut retry = 0;

        loop {
            match attempt().await {
                Ok(value) => {
                    if retry > 0 {
                        info!(
                            provider = %self.inner.name(),
                            operation,
                            attempt = retry + 1,
                            "Retry: request succeeded"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && retry < self.policy.max_retries => {
                    let delay = self.policy.delay_for(retry, &e);
                    warn!(
                        provider = %self.inner.name(),
                        operation,
                        attempt = retry + 1,
                        total,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retry: transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl issuespilot_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.run("complete", || self.inner.complete(request.clone()))
            .await
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        self.run("embed", || self.inner.embed(request.clone())).await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
