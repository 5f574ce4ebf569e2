//! Wire types and client for the conversational completion endpoint
//!
//! The endpoint is a blocking chat-completion API: one POST per user turn,
//! threaded into a server-side dialogue by the `conversation_id` the first
//! successful response hands back.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{ApiError, CampusChatError, Result};
use crate::net::transport::{Transport, TransportRequest};

/// Request body for one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The user's message
    pub query: String,
    /// Stable user identifier for this session
    pub user: String,
    /// Server-issued conversation token; null on the first turn
    pub conversation_id: Option<String>,
    /// Prompt variable bindings; always empty for this client
    pub inputs: HashMap<String, String>,
    /// Always `"blocking"`; streamed responses are not consumed
    pub response_mode: String,
    /// Let the server name the conversation
    pub auto_generate_name: bool,
}

impl ChatRequest {
    /// Build a request for one turn
    ///
    /// # Examples
    ///
    /// ```
    /// use campuschat::chat::api::ChatRequest;
    ///
    /// let request = ChatRequest::new("hello", "fixed_user", None);
    /// assert_eq!(request.response_mode, "blocking");
    /// assert!(request.conversation_id.is_none());
    /// ```
    pub fn new(
        query: impl Into<String>,
        user: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            query: query.into(),
            user: user.into(),
            conversation_id,
            inputs: HashMap::new(),
            response_mode: "blocking".to_string(),
            auto_generate_name: true,
        }
    }
}

/// Response body from the chat endpoint.
///
/// Every field the server may omit is optional. A missing `answer` with no
/// `error` is a soft failure the session reports without retrying.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatResponse {
    /// Assistant reply text
    #[serde(default)]
    pub answer: Option<String>,
    /// Conversation token to thread into the next turn
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Server-side creation time, epoch seconds
    #[serde(default)]
    pub created_at: i64,
    /// Message identifier
    #[serde(default)]
    pub message_id: Option<String>,
    /// Some responses carry `id` instead of `message_id`
    #[serde(default)]
    pub id: Option<String>,
    /// Structured error reported by the endpoint itself
    #[serde(default)]
    pub error: Option<String>,
    /// Numeric code accompanying `error`
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Usage and retrieval metadata
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

/// Usage and retrieval metadata attached to a response
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub usage: Option<UsageInfo>,
    #[serde(default)]
    pub retriever_resources: Option<Vec<RetrieverResource>>,
}

/// Token accounting for one completion
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_price: Option<String>,
}

/// One knowledge-base document the endpoint retrieved for the answer
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RetrieverResource {
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub score: f64,
}

/// Client for the `chat-messages` endpoint.
///
/// Generic over the transport chain it is given; retry, logging, and
/// header injection all live below this seam.
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
    user: String,
}

impl ChatClient {
    /// Build a client from the endpoint configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL does not parse or the
    /// endpoint path cannot be joined onto it.
    pub fn new(transport: Arc<dyn Transport>, api: &ApiConfig) -> Result<Self> {
        let base = url::Url::parse(&api.base_url)
            .map_err(|e| CampusChatError::Config(format!("invalid base url: {}", e)))?;
        let endpoint = base
            .join("chat-messages")
            .map_err(|e| CampusChatError::Config(format!("invalid endpoint path: {}", e)))?;

        Ok(Self {
            transport,
            endpoint: endpoint.to_string(),
            user: api.user.clone(),
        })
    }

    /// Send one chat turn and decode the reply.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Transport`] when the transport chain gave up.
    /// - [`ApiError::Status`] for a non-success final status, carrying the
    ///   body text verbatim.
    /// - [`ApiError::Json`] when a success body does not decode.
    pub async fn send(
        &self,
        query: &str,
        conversation_id: Option<&str>,
    ) -> std::result::Result<ChatResponse, ApiError> {
        let request = ChatRequest::new(
            query,
            self.user.clone(),
            conversation_id.map(str::to_string),
        );
        let body = serde_json::to_string(&request)?;

        let response = self
            .transport
            .execute(TransportRequest::post(self.endpoint.clone(), body))
            .await?;

        if !response.status.is_success() {
            return Err(ApiError::Status {
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}
