//! Chat session state machine
//!
//! [`ChatSession`] owns the visible message history and the conversation
//! state, drives the request pipeline, and recovers from transient
//! failures using connectivity signals. No failure ever escapes the
//! session as an error: every failure path terminates in exactly one
//! diagnostic chat message and a return to idle.
//!
//! # History snapshots
//!
//! History is published as immutable `Arc<[ChatMessage]>` snapshots
//! through a watch channel; an append builds a new snapshot rather than
//! mutating the old one, so readers never observe a partially-updated
//! sequence.
//!
//! # Retry layering
//!
//! The transport below this session already retries transient failures on
//! its own fixed-interval budget. The session adds a second, independent
//! budget with user-visible "retrying (n/max)" progress, plus a
//! connectivity-triggered replay of the last undelivered turn. The two
//! budgets intentionally compound; see DESIGN.md.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::api::{ChatClient, ChatResponse};
use crate::config::{NetworkConfig, SessionConfig};
use crate::error::{ApiError, TransportError};
use crate::net::connectivity::{ConnectivityObserver, NetworkQuality};

/// One visible chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message text
    pub content: String,
    /// True for the user's own messages, false for assistant output
    pub is_from_user: bool,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
}

impl ChatMessage {
    fn new(content: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            content: content.into(),
            is_from_user,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// A message typed by the user
    ///
    /// # Examples
    ///
    /// ```
    /// use campuschat::chat::session::ChatMessage;
    ///
    /// let message = ChatMessage::user("when does the library close?");
    /// assert!(message.is_from_user);
    /// assert!(message.timestamp > 0);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    /// A message from the assistant side, including diagnostics
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }
}

/// Conversation-level state owned exclusively by the session
#[derive(Debug, Default)]
struct ConversationState {
    /// Server-issued token threading turns into one dialogue
    conversation_id: Option<String>,
    /// Last content that has not been delivered yet; replay source
    last_request_content: Option<String>,
    /// Session-level retry counter for the pending turn
    retry_count: u32,
    /// Guard: at most one outbound request per session
    in_flight: bool,
}

const OFFLINE_MESSAGE: &str =
    "Unable to reach the network. Check your connection settings and try again.";
const EMPTY_RESULT_MESSAGE: &str =
    "The assistant returned an empty result, please try again.";
const RETRIES_EXHAUSTED_MESSAGE: &str =
    "Still unable to reach the assistant service after several attempts. \
     Check your network connection and try again later.";
const RECONNECTED_MESSAGE: &str = "Network connection restored, reconnecting...";

/// Chat session over the resilient request pipeline.
///
/// Construction seeds the greeting, starts connectivity observation, and
/// arms the reconnect watcher. Call [`shutdown`](Self::shutdown) on
/// teardown; afterwards no history mutation or notification occurs.
pub struct ChatSession {
    client: ChatClient,
    observer: Arc<ConnectivityObserver>,
    session_config: SessionConfig,
    network_config: NetworkConfig,
    state: Mutex<ConversationState>,
    messages: watch::Sender<Arc<[ChatMessage]>>,
    loading: watch::Sender<bool>,
    quality: watch::Sender<NetworkQuality>,
    cancel: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    /// Create a session and arm its background connectivity watcher
    pub fn new(
        client: ChatClient,
        observer: Arc<ConnectivityObserver>,
        session_config: SessionConfig,
        network_config: NetworkConfig,
    ) -> Arc<Self> {
        let (messages, _) = watch::channel::<Arc<[ChatMessage]>>(Vec::new().into());
        let (loading, _) = watch::channel(false);
        let (quality, _) = watch::channel(NetworkQuality::Unavailable);

        let session = Arc::new(Self {
            client,
            observer,
            session_config,
            network_config,
            state: Mutex::new(ConversationState::default()),
            messages,
            loading,
            quality,
            cancel: CancellationToken::new(),
            watcher: Mutex::new(None),
        });

        session.report(session.session_config.greeting.clone());
        session.observer.start();

        let mut online = session.observer.subscribe();
        let weak = Arc::downgrade(&session);
        let cancel = session.cancel.clone();
        let watcher = tokio::spawn(async move {
            let mut was_online = *online.borrow();
            if was_online {
                if let Some(session) = weak.upgrade() {
                    session.refresh_quality().await;
                }
            }
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = online.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                let is_online = *online.borrow_and_update();
                let Some(session) = weak.upgrade() else { return };
                if is_online && !was_online {
                    session.refresh_quality().await;
                    session.replay_pending().await;
                } else if !is_online {
                    session.quality.send_replace(NetworkQuality::Unavailable);
                }
                was_online = is_online;
            }
        });
        *lock(&session.watcher) = Some(watcher);

        session
    }

    /// Stream of history snapshots
    pub fn messages(&self) -> watch::Receiver<Arc<[ChatMessage]>> {
        self.messages.subscribe()
    }

    /// Current history snapshot
    pub fn snapshot(&self) -> Arc<[ChatMessage]> {
        self.messages.borrow().clone()
    }

    /// Whether a send is currently in flight
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Stream of loading-state changes
    pub fn loading_changes(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Last measured network quality
    pub fn quality(&self) -> NetworkQuality {
        *self.quality.borrow()
    }

    /// Stream of network-quality changes
    pub fn quality_changes(&self) -> watch::Receiver<NetworkQuality> {
        self.quality.subscribe()
    }

    /// Current conversation token, if a turn has succeeded yet
    pub fn conversation_id(&self) -> Option<String> {
        lock(&self.state).conversation_id.clone()
    }

    /// Send a user turn through the pipeline.
    ///
    /// The user's message is appended to history immediately, before the
    /// outcome of the network call is known. Returns `false` without
    /// touching any state when a send is already in flight; that is a
    /// caller-discipline violation, not a runtime failure, so nothing is
    /// appended either.
    pub async fn send_message(&self, content: &str) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.try_begin() {
            tracing::debug!("send rejected, a request is already in flight");
            return false;
        }

        self.append(ChatMessage::user(content));

        if !self.observer.is_online() {
            tracing::warn!("device offline, not attempting the request");
            self.report(OFFLINE_MESSAGE);
            self.end_exchange();
            return true;
        }

        lock(&self.state).retry_count = 0;
        self.run_exchange(content).await;
        self.end_exchange();
        true
    }

    /// Send the canned probe message through the same pipeline, bypassing
    /// the conversation association. The outcome lands in the visible
    /// history like any other reply; conversation state is untouched.
    pub async fn test_connection(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.try_begin() {
            tracing::debug!("connection test rejected, a request is already in flight");
            return false;
        }

        tracing::debug!("running connection test");
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                return true;
            }
            result = self.client.send(&self.session_config.test_query, None) => result,
        };
        match result {
            Ok(response) => self.report(format!(
                "Connection test succeeded: {}",
                response.answer.unwrap_or_else(|| "(no answer)".to_string())
            )),
            Err(error) => self.report(format!("Connection test failed: {}", error)),
        }
        self.end_exchange();
        true
    }

    /// Probe the network and publish the measured quality bucket
    pub async fn refresh_quality(&self) -> NetworkQuality {
        let quality = self
            .observer
            .check_quality(
                &self.network_config.probe_addr,
                self.network_config.probe_timeout(),
            )
            .await;
        self.quality.send_replace(quality);
        quality
    }

    /// Tear the session down.
    ///
    /// Cancels in-flight work and pending delays, stops the reconnect
    /// watcher, and releases the connectivity registration. After this
    /// call no history mutation or notification occurs.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.abort();
        }
        self.observer.stop();
        tracing::debug!("chat session shut down");
    }

    /// Run one logical exchange with session-level retry.
    ///
    /// Expects the in-flight guard to be held by the caller.
    async fn run_exchange(&self, content: &str) {
        loop {
            let conversation_id = {
                let mut state = lock(&self.state);
                state.last_request_content = Some(content.to_string());
                state.conversation_id.clone()
            };
            tracing::debug!(conversation = ?conversation_id, "dispatching chat request");

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.client.send(content, conversation_id.as_deref()) => result,
            };

            match result {
                Ok(response) => {
                    self.on_response(response);
                    return;
                }
                Err(ApiError::Status { status, body }) => {
                    // The transport already exhausted its budget on 5xx;
                    // any status that lands here is terminal.
                    tracing::error!(status, "chat endpoint returned an error status");
                    let detail = if body.trim().is_empty() {
                        "unknown error".to_string()
                    } else {
                        body
                    };
                    self.report(format!("The server returned an error ({}): {}", status, detail));
                    return;
                }
                Err(ApiError::Json(error)) => {
                    tracing::error!(%error, "chat response could not be decoded");
                    self.report(format!("There was a problem handling the request: {}", error));
                    return;
                }
                Err(ApiError::Transport(error)) => {
                    if !error.is_transient() {
                        tracing::error!(%error, "non-transient transport failure");
                        self.report(format!(
                            "There was a problem handling the request: {}",
                            error
                        ));
                        return;
                    }
                    if !self.bump_retry(&error) {
                        return;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.session_config.retry_delay()) => {}
                    }
                }
            }
        }
    }

    /// Handle a decoded endpoint response.
    ///
    /// Any decoded response settles the pending turn: the replay source is
    /// cleared and the retry counter reset, whether the response carries an
    /// answer, a structured error, or nothing.
    fn on_response(&self, response: ChatResponse) {
        {
            let mut state = lock(&self.state);
            state.last_request_content = None;
            state.retry_count = 0;
        }

        if let Some(error) = response.error {
            tracing::error!(error = %error, code = ?response.error_code, "chat endpoint reported an error");
            self.report(format!("The assistant service returned an error: {}", error));
        } else if let Some(answer) = response.answer {
            lock(&self.state).conversation_id = response.conversation_id.clone();
            tracing::debug!(conversation = ?response.conversation_id, "received assistant reply");
            self.report(answer);
        } else {
            tracing::warn!("chat endpoint returned neither an answer nor an error");
            self.report(EMPTY_RESULT_MESSAGE);
        }
    }

    /// Record a transient failure against the session retry budget.
    /// Returns true when another attempt should run.
    fn bump_retry(&self, error: &TransportError) -> bool {
        let (count, max) = {
            let mut state = lock(&self.state);
            state.retry_count += 1;
            (state.retry_count, self.session_config.max_retries)
        };

        if count <= max {
            let reason = match error {
                TransportError::Timeout => "The connection timed out",
                TransportError::Dns(_) => "The server address could not be resolved",
                _ => "The network connection failed",
            };
            tracing::warn!(%error, attempt = count, max, "transient failure, scheduling session retry");
            self.report(format!("{}, retrying... (attempt {}/{})", reason, count, max));
            true
        } else {
            tracing::error!(%error, "session retry budget exhausted");
            self.report(RETRIES_EXHAUSTED_MESSAGE);
            false
        }
    }

    /// Replay the last undelivered turn after connectivity returned.
    ///
    /// Skipped when nothing is pending, the retry budget is spent, or a
    /// manual send is in flight; the in-flight send already carries the
    /// content, and a later failure re-arms the replay.
    async fn replay_pending(&self) {
        let pending = {
            let state = lock(&self.state);
            if state.in_flight
                || state.retry_count >= self.session_config.max_retries
            {
                None
            } else {
                state.last_request_content.clone()
            }
        };
        let Some(content) = pending else { return };

        tracing::info!("connectivity restored with an undelivered turn, replaying");
        self.report(RECONNECTED_MESSAGE);
        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(self.session_config.reconnect_grace()) => {}
        }

        if !self.try_begin() {
            tracing::debug!("manual send started during the grace delay, skipping replay");
            return;
        }
        self.run_exchange(&content).await;
        self.end_exchange();
    }

    /// Claim the single in-flight slot; false when already taken
    fn try_begin(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.in_flight {
                return false;
            }
            state.in_flight = true;
        }
        self.loading.send_replace(true);
        true
    }

    /// Release the in-flight slot
    fn end_exchange(&self) {
        lock(&self.state).in_flight = false;
        self.loading.send_replace(false);
    }

    /// Append one message by publishing a fresh snapshot
    fn append(&self, message: ChatMessage) {
        self.messages.send_modify(|snapshot| {
            let mut next = snapshot.to_vec();
            next.push(message);
            *snapshot = next.into();
        });
    }

    /// Append an assistant-side message (replies and diagnostics)
    fn report(&self, content: impl Into<String>) {
        self.append(ChatMessage::assistant(content));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
