//! Chat session integration tests
//!
//! Drives a full session (real transport chain, hand-driven connectivity)
//! against a `wiremock` server: optimistic appends, conversation
//! threading, the in-flight guard, offline short-circuiting, and visible
//! session-level retry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use campuschat::net::connectivity::LinkState;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_round_trip_appends_user_then_assistant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"answer":"hi","conversation_id":"abc","created_at":1714000000}"#,
        ))
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    assert!(session.send_message("hello").await);

    let snapshot = session.snapshot();
    // Greeting plus exactly two new entries, in send order.
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot[1].is_from_user);
    assert_eq!(snapshot[1].content, "hello");
    assert!(!snapshot[2].is_from_user);
    assert_eq!(snapshot[2].content, "hi");
    assert_eq!(session.conversation_id().as_deref(), Some("abc"));
    session.shutdown();
}

#[tokio::test]
async fn test_conversation_id_threads_into_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(body_string_contains(r#""conversation_id":null"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"answer":"hi","conversation_id":"abc"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(body_string_contains(r#""conversation_id":"abc""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"answer":"again","conversation_id":"abc"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    session.send_message("hello").await;
    session.send_message("one more").await;

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    session.shutdown();
}

#[tokio::test]
async fn test_sends_while_loading_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"answer":"slow"}"#)
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.send_message("first").await }
    });
    // Let the first send claim the in-flight slot.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(session.is_loading());
    assert!(!session.send_message("second").await, "second send must be rejected");
    assert!(first.await.unwrap());

    // Only the first send reached the wire or the history.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    let texts = common::contents(&session);
    assert!(texts.iter().any(|t| t == "first"));
    assert!(!texts.iter().any(|t| t == "second"));
    session.shutdown();
}

#[tokio::test]
async fn test_offline_send_never_touches_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"answer":"hi"}"#))
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::OFFLINE);

    assert!(session.send_message("anyone?").await);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot[1].is_from_user);
    assert!(snapshot[2].content.contains("Unable to reach the network"));
    assert!(server.received_requests().await.unwrap().is_empty());
    session.shutdown();
}

#[tokio::test]
async fn test_dead_endpoint_shows_retry_progress_then_terminal_failure() {
    // Nothing listens on port 1: the transport exhausts its budget per
    // session attempt, and the session burns its own budget visibly.
    let config = common::test_config("http://127.0.0.1:1");
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    session.send_message("hello").await;

    let texts = common::contents(&session);
    assert!(texts.iter().any(|t| t.contains("(attempt 1/3)")));
    assert!(texts.iter().any(|t| t.contains("(attempt 2/3)")));
    assert!(texts.iter().any(|t| t.contains("(attempt 3/3)")));
    assert!(texts
        .last()
        .unwrap()
        .contains("after several attempts"));
    session.shutdown();
}

#[tokio::test]
async fn test_reconnect_replays_last_failed_request() {
    let server = MockServer::start().await;
    // The transport burns its three attempts on 500s; the session surfaces
    // the status error and keeps the turn recorded as undelivered.
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(body_string_contains(r#""query":"retry me""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"answer":"made it","conversation_id":"abc"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    session.send_message("retry me").await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(common::contents(&session)
        .last()
        .unwrap()
        .contains("(500)"));

    connectivity.set(LinkState::OFFLINE);
    tokio::time::sleep(Duration::from_millis(30)).await;
    connectivity.set(LinkState::ONLINE);
    // Grace delay is 10ms in the test config; give the replay room to land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        server.received_requests().await.unwrap().len(),
        4,
        "exactly one automatic resubmission"
    );
    let texts = common::contents(&session);
    assert!(texts.iter().any(|t| t.contains("reconnecting")));
    assert_eq!(texts.last().unwrap(), "made it");
    assert_eq!(session.conversation_id().as_deref(), Some("abc"));
    session.shutdown();
}

#[tokio::test]
async fn test_test_connection_reports_into_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(body_string_contains(r#""conversation_id":null"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"answer":"pong"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server.uri());
    let (session, _connectivity) = common::session_with_connectivity(&config, LinkState::ONLINE);

    assert!(session.test_connection().await);

    let texts = common::contents(&session);
    assert!(texts.last().unwrap().contains("Connection test succeeded"));
    assert!(texts.last().unwrap().contains("pong"));
    assert!(session.conversation_id().is_none());
    session.shutdown();
}
