//! Conversation repository client
//!
//! Pure I/O against the remote messaging API. No caching beyond the current
//! request and no mutation of shared state: results are handed back to the
//! facade, which merges them.

pub mod http;
pub mod mock;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use gigboard_common::config::{parse_timeout, DEFAULT_REQUEST_TIMEOUT_SECS};
use gigboard_common::{Error, Result};

use crate::domain::entities::{Attachment, Conversation, Message};

pub use http::HttpConversationsClient;
pub use mock::{MockCall, MockConversationsApi, MockGate};

/// One page of messages, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Cursor for the next older page; `None` when the history is exhausted
    pub next_cursor: Option<String>,
}

/// Body of a send request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    /// Correlation token echoed back by the server on the confirmed message
    pub client_ref: Option<String>,
}

/// Remote messaging API
#[async_trait::async_trait]
pub trait ConversationsApi: Send + Sync {
    /// Conversations for a user, most recent activity first. A user without
    /// conversations yields an empty list, never `NotFound`.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// One page of messages; `cursor` selects an older page.
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage>;

    /// Persist a new message and return the server-confirmed copy.
    async fn send_message(&self, request: SendMessageRequest) -> Result<Message>;
}

pub(crate) fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::Validation("User id is required".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    if conversation_id.trim().is_empty() {
        return Err(Error::Validation("Conversation id is required".to_string()));
    }
    Ok(())
}

/// Messaging API client configuration
#[derive(Clone)]
pub struct MessagingConfig {
    /// Provider (http, mock)
    pub provider: String,
    /// Base URL of the REST backend, e.g. `https://api.gigboard.dev/v1`
    pub api_base_url: String,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingConfig")
            .field("provider", &self.provider)
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl MessagingConfig {
    /// Create messaging config from environment variables
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("MESSAGING_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let api_base_url = std::env::var("MESSAGING_API_URL")
            .unwrap_or_else(|_| "http://localhost:5000/api".to_string());

        let api_token = std::env::var("MESSAGING_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let timeout_secs = match std::env::var("MESSAGING_TIMEOUT_SECS") {
            Ok(value) => parse_timeout(&value)?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            provider,
            api_base_url,
            api_token,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Factory for creating ConversationsApi implementations
pub struct ConversationsApiFactory;

impl ConversationsApiFactory {
    pub fn create(config: MessagingConfig) -> Result<Box<dyn ConversationsApi>> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!(base_url = %config.api_base_url, "Creating HTTP messaging client");
                Ok(Box::new(HttpConversationsClient::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock messaging client");
                Ok(Box::new(MockConversationsApi::new()))
            }
            provider => Err(Error::Configuration(format!(
                "Unknown messaging provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
