//! Mock conversation repository
//!
//! In-memory backend for tests and local development:
//! - seeded conversations and message histories
//! - queued failures per call
//! - gates that hold the next matching call until released, to drive
//!   interleavings deterministically
//! - call recording for assertions

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

use gigboard_common::{Error, Result};

use super::{
    validate_conversation_id, validate_user_id, ConversationsApi, MessagePage, SendMessageRequest,
};
use crate::domain::entities::{validate_outgoing, Conversation, DeliveryStatus, Message};
use crate::domain::state::SendState;

/// Default number of messages per page
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A call the mock can fail or hold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockCall {
    ListConversations,
    /// Message fetch for one conversation
    FetchMessages(String),
    /// Send into one conversation
    SendMessage(String),
}

/// Releases a held call
#[derive(Debug, Clone)]
pub struct MockGate {
    semaphore: Arc<Semaphore>,
}

impl MockGate {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let the held call complete
    pub fn release(&self) {
        self.semaphore.add_permits(1);
    }

    async fn wait(&self) {
        // Closed only if dropped, which never happens while we hold a clone
        if let Ok(permit) = self.semaphore.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default)]
struct MockData {
    conversations: HashMap<String, Vec<Conversation>>,
    messages: HashMap<String, Vec<Message>>,
    failures: HashMap<MockCall, VecDeque<Error>>,
    gates: HashMap<MockCall, VecDeque<MockGate>>,
    calls: Vec<MockCall>,
    sent: Vec<SendMessageRequest>,
}

/// Mock messaging backend with programmable behavior
#[derive(Debug, Clone)]
pub struct MockConversationsApi {
    data: Arc<Mutex<MockData>>,
    next_id: Arc<AtomicU64>,
    page_size: usize,
}

impl MockConversationsApi {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(MockData::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn data(&self) -> MutexGuard<'_, MockData> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed the conversation list returned for `user_id`
    pub fn set_conversations(&self, user_id: &str, conversations: Vec<Conversation>) {
        self.data()
            .conversations
            .insert(user_id.to_string(), conversations);
    }

    /// Seed the server-side history of a conversation
    pub fn set_messages(&self, conversation_id: &str, mut messages: Vec<Message>) {
        crate::domain::merge::sort_messages(&mut messages);
        self.data()
            .messages
            .insert(conversation_id.to_string(), messages);
    }

    /// Make the next matching call fail with `error`
    pub fn fail_next(&self, call: MockCall, error: Error) {
        self.data().failures.entry(call).or_default().push_back(error);
    }

    /// Hold the next matching call until the returned gate is released.
    /// A gate that is never released simulates a request that never resolves.
    pub fn hold_next(&self, call: MockCall) -> MockGate {
        let gate = MockGate::new();
        self.data()
            .gates
            .entry(call)
            .or_default()
            .push_back(gate.clone());
        gate
    }

    /// Calls received so far, in arrival order
    pub fn recorded_calls(&self) -> Vec<MockCall> {
        self.data().calls.clone()
    }

    /// Send requests received so far
    pub fn sent_requests(&self) -> Vec<SendMessageRequest> {
        self.data().sent.clone()
    }

    /// Server-side history of a conversation
    pub fn stored_messages(&self, conversation_id: &str) -> Vec<Message> {
        self.data()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Record the call, wait on its gate if any, then pop a queued failure
    async fn enter(&self, call: MockCall) -> Result<()> {
        let gate = {
            let mut data = self.data();
            data.calls.push(call.clone());
            data.gates.get_mut(&call).and_then(VecDeque::pop_front)
        };

        if let Some(gate) = gate {
            tracing::debug!(call = ?call, "Mock messaging: holding call");
            gate.wait().await;
        }

        match self
            .data()
            .failures
            .get_mut(&call)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for MockConversationsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConversationsApi for MockConversationsApi {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        validate_user_id(user_id)?;
        self.enter(MockCall::ListConversations).await?;

        Ok(self
            .data()
            .conversations
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage> {
        validate_conversation_id(conversation_id)?;
        self.enter(MockCall::FetchMessages(conversation_id.to_string()))
            .await?;

        let data = self.data();
        let history = data
            .messages
            .get(conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))?;

        let end = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| Error::Validation(format!("Invalid cursor: {}", cursor)))?
                .min(history.len()),
            None => history.len(),
        };
        let start = end.saturating_sub(self.page_size);

        Ok(MessagePage {
            messages: history[start..end].to_vec(),
            next_cursor: (start > 0).then(|| start.to_string()),
        })
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message> {
        validate_conversation_id(&request.conversation_id)?;
        validate_outgoing(&request.content, request.attachment.as_ref())?;

        self.data().sent.push(request.clone());
        self.enter(MockCall::SendMessage(request.conversation_id.clone()))
            .await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: format!("msg-{}", id),
            conversation_id: request.conversation_id.clone(),
            sender_id: "self".to_string(),
            content: request.content,
            attachment: request.attachment,
            created_at: Utc::now(),
            delivery: DeliveryStatus::Delivered,
            client_ref: request.client_ref,
            send_state: SendState::Confirmed,
        };

        tracing::debug!(message_id = %message.id, "Mock messaging: storing message");
        self.data()
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());

        Ok(message)
    }
}
