//! reqwest-backed HTTP transport with pluggable DNS resolution
//!
//! The transport applies the configured per-attempt timeouts and, when
//! [`DnsMode::Ipv4Only`] is selected, restricts host resolution to IPv4
//! addresses. The IPv4 restriction is an operational workaround for an
//! IPv6 routing problem in the deployment environment; it is a resolver
//! strategy rather than a hard-coded address filter so it can be switched
//! off per config.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;

use super::{Transport, TransportRequest, TransportResponse};
use crate::config::{ApiConfig, DnsMode};
use crate::error::TransportError;

/// Marker error emitted by [`Ipv4OnlyResolver`] so DNS failures stay
/// distinguishable after reqwest wraps them in its own error type.
#[derive(Debug, Error)]
#[error("dns lookup failed for {host}: {message}")]
struct DnsFailure {
    host: String,
    message: String,
}

/// Resolver strategy that keeps only IPv4 addresses
struct Ipv4OnlyResolver;

impl Resolve for Ipv4OnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host.as_str(), 0)).await.map_err(
                |error| -> Box<dyn std::error::Error + Send + Sync> {
                    Box::new(DnsFailure {
                        host: host.clone(),
                        message: error.to_string(),
                    })
                },
            )?;

            let v4: Vec<SocketAddr> = addrs.filter(|addr| addr.is_ipv4()).collect();
            if v4.is_empty() {
                return Err(Box::new(DnsFailure {
                    host,
                    message: "no ipv4 addresses".to_string(),
                }) as Box<dyn std::error::Error + Send + Sync>);
            }
            Ok(Box::new(v4.into_iter()) as Addrs)
        })
    }
}

/// Raw HTTP transport over a shared reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the transport with per-attempt timeouts and the configured
    /// DNS strategy.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Other`] if client construction fails
    /// (TLS backend initialisation is the only realistic cause).
    pub fn new(api: &ApiConfig, dns: DnsMode) -> std::result::Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(api.connect_timeout())
            .timeout(api.request_timeout())
            .user_agent(concat!("campuschat/", env!("CARGO_PKG_VERSION")));

        if dns == DnsMode::Ipv4Only {
            builder = builder.dns_resolver(Arc::new(Ipv4OnlyResolver));
        }

        let client = builder
            .build()
            .map_err(|error| TransportError::Other(format!("failed to build http client: {}", error)))?;

        tracing::debug!(?dns, "http transport initialised");
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        Ok(TransportResponse { status, body })
    }
}

/// Map a reqwest error onto the transport failure taxonomy.
///
/// The custom resolver's [`DnsFailure`] marker survives inside the error's
/// source chain, which is the only reliable way to tell resolution failures
/// apart from other connect errors.
fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout;
    }

    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        if let Some(dns) = cause.downcast_ref::<DnsFailure>() {
            return TransportError::Dns(dns.to_string());
        }
        source = cause.source();
    }

    if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() || error.is_redirect() {
        TransportError::Other(error.to_string())
    } else {
        TransportError::Io(error.to_string())
    }
}
