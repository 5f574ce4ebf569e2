//! Transport chain integration tests
//!
//! Exercises the composed chain (logging, retry, header injection, HTTP)
//! against a `wiremock` server: retry bounds, terminal statuses, and
//! header injection through every layer.

mod common;

use campuschat::net::transport::{build_transport, Transport, TransportRequest};

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_request(server_uri: &str) -> TransportRequest {
    TransportRequest::post(
        format!("{}/v1/chat-messages", server_uri),
        r#"{"query":"hello"}"#,
    )
}

#[tokio::test]
async fn test_server_errors_retry_until_success() {
    let server = MockServer::start().await;

    // Two 503s, then a 200. Attempt three must see the success.
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"answer":"hi"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let transport = build_transport(&config.api, &config.network).unwrap();

    let response = transport.execute(chat_request(&server.uri())).await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.body, r#"{"answer":"hi"}"#);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_error_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such app"))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let transport = build_transport(&config.api, &config.network).unwrap();

    let response = transport.execute(chat_request(&server.uri())).await.unwrap();
    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(response.body, "no such app");
}

#[tokio::test]
async fn test_persistent_server_error_returns_final_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("broken"))
        .expect(3)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let transport = build_transport(&config.api, &config.network).unwrap();

    // With max_retries = 3 the final 500 is returned, not raised.
    let response = transport.execute(chat_request(&server.uri())).await.unwrap();
    assert_eq!(response.status.as_u16(), 500);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_chain_injects_api_headers_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(header("Authorization", "Bearer app-test-key"))
        .and(header("Content-Type", "application/json"))
        .and(header("Accept", "application/json"))
        .and(body_string_contains(r#""query":"hello""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"answer":"hi"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let transport = build_transport(&config.api, &config.network).unwrap();

    let response = transport.execute(chat_request(&server.uri())).await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn test_unreachable_endpoint_propagates_transient_error() {
    // Nothing listens on port 1; every attempt fails at connect.
    let config = common::test_config("http://127.0.0.1:1");
    let transport = build_transport(&config.api, &config.network).unwrap();

    let error = transport
        .execute(chat_request("http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert!(error.is_transient());
}
