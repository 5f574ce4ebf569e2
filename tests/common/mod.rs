//! Shared helpers for integration tests
//!
//! Builds sessions over the real transport chain, pointed at a wiremock
//! server, with all delays shrunk so tests run in milliseconds.

#![allow(dead_code)]

use std::sync::Arc;

use campuschat::chat::api::ChatClient;
use campuschat::chat::session::ChatSession;
use campuschat::config::Config;
use campuschat::net::connectivity::{
    ConnectivityObserver, ConnectivitySource, LinkState, StaticConnectivity,
};
use campuschat::net::transport::build_transport;

/// Configuration pointed at a mock server base URL, with fast timings
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{}/v1/", server_uri);
    config.api.api_key = "app-test-key".to_string();
    config.api.connect_timeout_ms = 2_000;
    config.api.read_timeout_ms = 2_000;
    config.api.write_timeout_ms = 2_000;
    config.network.retry_interval_ms = 10;
    // Quality probes hit a dead local port so they settle immediately
    // instead of waiting on a real network.
    config.network.probe_addr = "127.0.0.1:1".to_string();
    config.network.probe_timeout_ms = 50;
    config.session.retry_delay_ms = 10;
    config.session.reconnect_grace_ms = 10;
    config
}

/// Session over the real transport chain plus hand-driven connectivity
pub fn session_with_connectivity(
    config: &Config,
    initial: LinkState,
) -> (Arc<ChatSession>, Arc<StaticConnectivity>) {
    let connectivity = Arc::new(StaticConnectivity::new(initial));
    let observer = Arc::new(ConnectivityObserver::new(
        Arc::clone(&connectivity) as Arc<dyn ConnectivitySource>
    ));
    let transport = build_transport(&config.api, &config.network).expect("transport builds");
    let client = ChatClient::new(transport, &config.api).expect("client builds");
    let session = ChatSession::new(
        client,
        observer,
        config.session.clone(),
        config.network.clone(),
    );
    (session, connectivity)
}

/// Message texts currently visible in the session history
pub fn contents(session: &ChatSession) -> Vec<String> {
    session
        .snapshot()
        .iter()
        .map(|message| message.content.clone())
        .collect()
}
