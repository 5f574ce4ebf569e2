//! Bounded fixed-interval retry middleware
//!
//! [`RetryingTransport`] executes one logical request with automatic retry
//! for transient failures. Statuses 200-499 are terminal: success and
//! client errors are returned as-is, because client errors are not
//! transient. 5xx responses and transport-level errors are retried after a
//! fixed pause, each time with a fresh copy of the request. The interval is
//! deliberately fixed rather than exponential.
//!
//! Every attempt is reported to an [`AttemptHook`] with method, URL,
//! outcome, and elapsed time; the default hook logs through `tracing`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::{Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;

/// What a single attempt produced
#[derive(Debug)]
pub enum AttemptOutcome<'a> {
    /// The attempt completed with a response
    Response(StatusCode),
    /// The attempt failed at the transport level
    Error(&'a TransportError),
}

/// Report on one transport attempt, passed to the attempt hook
#[derive(Debug)]
pub struct Attempt<'a> {
    /// 1-based attempt number within this logical request
    pub number: u32,
    /// Request method
    pub method: &'a Method,
    /// Request URL
    pub url: &'a str,
    /// Outcome of this attempt
    pub outcome: AttemptOutcome<'a>,
    /// Wall-clock time the attempt took
    pub elapsed: Duration,
}

/// Hook invoked after every attempt
pub type AttemptHook = Arc<dyn Fn(&Attempt<'_>) + Send + Sync>;

/// Default attempt hook: logs through `tracing`
fn log_attempt(attempt: &Attempt<'_>) {
    match &attempt.outcome {
        AttemptOutcome::Response(status) => tracing::debug!(
            attempt = attempt.number,
            method = %attempt.method,
            url = attempt.url,
            status = %status,
            elapsed = ?attempt.elapsed,
            "transport attempt completed"
        ),
        AttemptOutcome::Error(error) => tracing::warn!(
            attempt = attempt.number,
            method = %attempt.method,
            url = attempt.url,
            %error,
            elapsed = ?attempt.elapsed,
            "transport attempt failed"
        ),
    }
}

/// Retry middleware over an inner transport
pub struct RetryingTransport {
    inner: Arc<dyn Transport>,
    max_retries: u32,
    retry_interval: Duration,
    on_attempt: AttemptHook,
}

impl RetryingTransport {
    /// Wrap `inner` with bounded retry.
    ///
    /// `max_retries` is the total number of attempts made for one logical
    /// request; `retry_interval` is the fixed pause before each reattempt.
    pub fn new(inner: Arc<dyn Transport>, max_retries: u32, retry_interval: Duration) -> Self {
        Self {
            inner,
            max_retries,
            retry_interval,
            on_attempt: Arc::new(log_attempt),
        }
    }

    /// Replace the per-attempt hook
    pub fn with_attempt_hook(mut self, hook: AttemptHook) -> Self {
        self.on_attempt = hook;
        self
    }
}

#[async_trait]
impl Transport for RetryingTransport {
    /// Execute with bounded retry.
    ///
    /// If the final attempt produced a response, that response is returned
    /// even when it is a 5xx; the caller decides what a server error means.
    /// If the final attempt failed at the transport level, that error is
    /// propagated.
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                tokio::time::sleep(self.retry_interval).await;
            }

            let started = Instant::now();
            let result = self.inner.execute(request.clone()).await;
            let elapsed = started.elapsed();

            match result {
                Ok(response) => {
                    (self.on_attempt)(&Attempt {
                        number: attempt,
                        method: &request.method,
                        url: &request.url,
                        outcome: AttemptOutcome::Response(response.status),
                        elapsed,
                    });
                    if response.status.is_server_error() && attempt < self.max_retries {
                        tracing::warn!(
                            status = %response.status,
                            attempt,
                            max = self.max_retries,
                            "server error, retrying"
                        );
                        continue;
                    }
                    return Ok(response);
                }
                Err(error) => {
                    (self.on_attempt)(&Attempt {
                        number: attempt,
                        method: &request.method,
                        url: &request.url,
                        outcome: AttemptOutcome::Error(&error),
                        elapsed,
                    });
                    if attempt < self.max_retries {
                        tracing::warn!(
                            %error,
                            attempt,
                            max = self.max_retries,
                            "transport error, retrying"
                        );
                        continue;
                    }
                    return Err(error);
                }
            }
        }

        // Only reachable with a zero attempt budget, which configuration
        // validation rejects.
        Err(TransportError::Other(
            "no transport attempts were made".to_string(),
        ))
    }
}
