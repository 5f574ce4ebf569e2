//! HTTP transport abstraction and middleware chain
//!
//! This module defines the [`Transport`] trait that the chat client sends
//! through. Concrete implementations live in submodules:
//!
//! - [`http::HttpTransport`] -- reqwest-backed transport with pluggable
//!   DNS resolution.
//! - [`retry::RetryingTransport`] -- bounded fixed-interval retry
//!   middleware with per-attempt observer hooks.
//! - [`fake::FakeTransport`] -- in-process scripted transport used in
//!   tests.
//!
//! # Design
//!
//! A transport executes one logical request and resolves to a final
//! response or a classified [`TransportError`]. Cross-cutting behavior is
//! layered as decorators over the raw HTTP transport, composed in a fixed
//! declared order by [`build_transport`]:
//!
//! ```text
//! logging -> retry -> header-injection -> http
//! ```
//!
//! The logging layer reports one line per logical request; attempt-level
//! detail comes from the retry layer's hooks. Header injection sits inside
//! the retry layer so every attempt carries fresh headers.

pub mod fake;
pub mod http;
pub mod retry;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::config::{ApiConfig, NetworkConfig};
use crate::error::TransportError;

/// One outbound HTTP request.
///
/// Cloneable by design: the retry layer reissues a fresh copy per attempt
/// instead of reusing a possibly-consumed request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute request URL
    pub url: String,
    /// Header name/value pairs; later layers add to these
    pub headers: Vec<(String, String)>,
    /// Request body, if any
    pub body: Option<String>,
}

impl TransportRequest {
    /// Build a POST request with a body
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Build a bodyless GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Whether a header with this name is already present
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// Final response to a transport request: status plus body text
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status of the final attempt
    pub status: StatusCode,
    /// Response body read to completion
    pub body: String,
}

/// Abstraction over request execution.
///
/// Implementations must be cheap to share behind an [`Arc`]; the chat
/// client and its middleware hold them as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one logical request to completion
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Middleware that logs one line per logical request.
///
/// Logs method, URL, and request body at debug before dispatch, then the
/// final status and total elapsed time after. Failed statuses get the body
/// echoed at error level so endpoint diagnostics are never silently
/// dropped.
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
}

impl LoggingTransport {
    /// Wrap `inner` with request/response logging
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let method = request.method.clone();
        let url = request.url.clone();
        match &request.body {
            Some(body) => tracing::debug!(%method, %url, body = %body, "sending request"),
            None => tracing::debug!(%method, %url, "sending request"),
        }

        let started = Instant::now();
        let result = self.inner.execute(request).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(%method, %url, status = %response.status, ?elapsed, "request completed");
                if !response.status.is_success() {
                    tracing::error!(%method, %url, status = %response.status, body = %response.body, "request returned an error status");
                }
            }
            Err(error) => {
                tracing::error!(%method, %url, %error, ?elapsed, "request failed");
            }
        }
        result
    }
}

/// Middleware that injects static headers into every request.
///
/// Headers already present on a request are left untouched, so callers can
/// override any of the defaults per request.
pub struct HeaderTransport {
    inner: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
}

impl HeaderTransport {
    /// Wrap `inner`, injecting `headers` into each request
    pub fn new(inner: Arc<dyn Transport>, headers: Vec<(String, String)>) -> Self {
        Self { inner, headers }
    }

    /// Standard header set for the conversational endpoint: content
    /// negotiation plus the bearer credential.
    pub fn for_api(inner: Arc<dyn Transport>, api_key: &str) -> Self {
        Self::new(
            inner,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Bearer {}", api_key)),
            ],
        )
    }
}

#[async_trait]
impl Transport for HeaderTransport {
    async fn execute(
        &self,
        mut request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        for (name, value) in &self.headers {
            if !request.has_header(name) {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        self.inner.execute(request).await
    }
}

/// Compose the full chat transport chain in its declared order:
/// logging over retry over header injection over raw HTTP.
///
/// # Errors
///
/// Returns an error if the underlying HTTP client cannot be constructed.
pub fn build_transport(
    api: &ApiConfig,
    network: &NetworkConfig,
) -> std::result::Result<Arc<dyn Transport>, TransportError> {
    let raw = http::HttpTransport::new(api, network.dns)?;
    let with_headers = HeaderTransport::for_api(Arc::new(raw), &api.api_key);
    let retrying = retry::RetryingTransport::new(
        Arc::new(with_headers),
        network.max_retries,
        network.retry_interval(),
    );
    Ok(Arc::new(LoggingTransport::new(Arc::new(retrying))))
}
