//! In-process scripted transport for unit and integration tests
//!
//! [`FakeTransport`] returns a scripted sequence of results and records
//! every request it receives, letting tests assert on attempt counts and
//! request construction without a network. Script entries are consumed in
//! order; once the script is exhausted the configured default status (if
//! any) is repeated.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;

type ScriptedResult = std::result::Result<TransportResponse, TransportError>;

/// Scripted transport double
pub struct FakeTransport {
    script: Mutex<VecDeque<ScriptedResult>>,
    default: Mutex<Option<(StatusCode, String)>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    /// Create an empty fake behind an [`Arc`], ready for scripting
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a response with the given status and body
    pub fn push_status(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        lock(&self.script).push_back(Ok(TransportResponse {
            status,
            body: body.to_string(),
        }));
    }

    /// Queue a transport-level error
    pub fn push_error(&self, error: TransportError) {
        lock(&self.script).push_back(Err(error));
    }

    /// Response repeated once the script is exhausted
    pub fn set_default_status(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        *lock(&self.default) = Some((status, body.to_string()));
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<TransportRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: TransportRequest) -> ScriptedResult {
        lock(&self.requests).push(request);

        if let Some(result) = lock(&self.script).pop_front() {
            return result;
        }
        if let Some((status, body)) = lock(&self.default).clone() {
            return Ok(TransportResponse { status, body });
        }
        Err(TransportError::Other(
            "fake transport script exhausted".to_string(),
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let fake = FakeTransport::new();
        fake.push_status(503, "busy");
        fake.push_status(200, "ok");

        let first = fake
            .execute(TransportRequest::get("http://example.edu/"))
            .await
            .unwrap();
        assert_eq!(first.status.as_u16(), 503);

        let second = fake
            .execute(TransportRequest::get("http://example.edu/"))
            .await
            .unwrap();
        assert_eq!(second.status.as_u16(), 200);

        assert_eq!(fake.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_without_default_errors() {
        let fake = FakeTransport::new();
        let result = fake
            .execute(TransportRequest::get("http://example.edu/"))
            .await;
        assert!(matches!(result, Err(TransportError::Other(_))));
    }

    #[tokio::test]
    async fn test_default_status_repeats() {
        let fake = FakeTransport::new();
        fake.set_default_status(500, "broken");
        for _ in 0..3 {
            let response = fake
                .execute(TransportRequest::get("http://example.edu/"))
                .await
                .unwrap();
            assert_eq!(response.status.as_u16(), 500);
        }
    }
}
