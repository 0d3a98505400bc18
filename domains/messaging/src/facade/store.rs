//! State owned by the messaging facade
//!
//! Every mutation is synchronous and happens under the facade's lock; the
//! facade only releases the lock around remote calls. Each async operation
//! is split into a `begin_*` step (captures what it needs to detect a stale
//! result) and a `finish_*` step (applies or discards the result).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use gigboard_common::{Error, Result, StateError};

use crate::domain::entities::{Attachment, Conversation, Message};
use crate::domain::merge::MessageThread;
use crate::domain::selection::ConversationSelection;
use crate::repository::{MessagePage, SendMessageRequest};

/// An optimistic message that has not been confirmed yet
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutgoingSend {
    pub conversation_id: String,
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl OutgoingSend {
    fn to_request(&self, temp_id: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id: self.conversation_id.clone(),
            content: self.content.clone(),
            attachment: self.attachment.clone(),
            client_ref: Some(temp_id.to_string()),
        }
    }
}

/// Token captured when a message fetch starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchTicket {
    pub conversation_id: String,
    pub cursor: Option<String>,
    session: u64,
    epoch: u64,
}

/// Read-only view handed to the UI layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagingSnapshot {
    pub user_id: Option<String>,
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<String>,
    pub active_conversation: Option<Conversation>,
    /// Messages of the active conversation, oldest first
    pub messages: Vec<Message>,
    /// Whether an older page can be loaded for the active conversation
    pub has_older_messages: bool,
    pub loading_conversations: bool,
    pub loading_messages: bool,
    pub sending: bool,
    pub error_conversations: Option<Error>,
    pub error_messages: Option<Error>,
    pub error_send: Option<Error>,
}

#[derive(Debug, Default)]
pub(crate) struct MessagingStore {
    user_id: Option<String>,
    /// Bumped when the user changes; fetches from an older session are dropped
    session: u64,
    /// Bumped by every `initialize`; older list loads are discarded
    load_generation: u64,
    /// Bumped by every selection change; older fetches only touch background state
    selection_epoch: u64,
    selection: ConversationSelection,
    threads: HashMap<String, MessageThread>,
    outbox: HashMap<String, OutgoingSend>,
    last_local_timestamp: Option<DateTime<Utc>>,
    loading_conversations: bool,
    loading_messages: bool,
    sends_in_flight: usize,
    error_conversations: Option<Error>,
    error_messages: Option<Error>,
    error_send: Option<Error>,
}

impl MessagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_initialize(&mut self, user_id: &str) -> u64 {
        if self.user_id.as_deref() != Some(user_id) {
            if let Some(previous) = &self.user_id {
                tracing::info!(previous = %previous, user_id = %user_id, "Switching messaging user");
            }
            self.reset();
            self.user_id = Some(user_id.to_string());
        }
        self.load_generation += 1;
        self.loading_conversations = true;
        self.error_conversations = None;
        self.load_generation
    }

    pub fn finish_initialize(
        &mut self,
        generation: u64,
        result: Result<Vec<Conversation>>,
    ) -> Result<()> {
        if generation != self.load_generation {
            tracing::warn!(
                generation,
                current = self.load_generation,
                "Discarding stale conversation list"
            );
            return Ok(());
        }

        self.loading_conversations = false;
        match result {
            Ok(conversations) => {
                tracing::info!(count = conversations.len(), "Conversation list loaded");
                let previous = self.selection.active_id().map(str::to_string);
                self.selection.set_conversations(conversations);
                if previous.is_some() && self.selection.active_id().is_none() {
                    self.selection_epoch += 1;
                    self.loading_messages = false;
                    self.error_messages = None;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load conversations");
                self.error_conversations = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Change the selection, then hand back a ticket for the first page
    pub fn begin_select(&mut self, conversation_id: &str) -> Result<FetchTicket> {
        self.selection.select(conversation_id)?;
        self.selection_epoch += 1;
        self.loading_messages = true;
        self.error_messages = None;
        Ok(FetchTicket {
            conversation_id: conversation_id.to_string(),
            cursor: None,
            session: self.session,
            epoch: self.selection_epoch,
        })
    }

    /// Ticket for the next older page of the active conversation, if any
    pub fn begin_load_older(&mut self) -> Result<Option<FetchTicket>> {
        let conversation_id = self
            .selection
            .active_id()
            .ok_or(Error::NoActiveConversation)?
            .to_string();

        let Some(cursor) = self
            .threads
            .get(&conversation_id)
            .and_then(|t| t.next_cursor())
            .map(str::to_string)
        else {
            return Ok(None);
        };

        self.loading_messages = true;
        self.error_messages = None;
        Ok(Some(FetchTicket {
            conversation_id,
            cursor: Some(cursor),
            session: self.session,
            epoch: self.selection_epoch,
        }))
    }

    /// Apply a fetched page. A page whose selection has moved on is merged
    /// into that conversation's background thread only; a page fetched for a
    /// previous user is dropped and reported as a lost selection.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, result: Result<MessagePage>) -> Result<()> {
        if ticket.session != self.session {
            tracing::warn!(
                conversation_id = %ticket.conversation_id,
                "User changed during fetch; dropping page"
            );
            return Err(Error::Selection(ticket.conversation_id));
        }

        let current = ticket.epoch == self.selection_epoch;

        match result {
            Ok(page) => {
                let thread = self
                    .threads
                    .entry(ticket.conversation_id.clone())
                    .or_default();
                if ticket.cursor.is_some() {
                    thread.apply_older_page(page.messages, page.next_cursor);
                } else {
                    thread.apply_latest_page(page.messages, page.next_cursor);
                }

                if current {
                    self.loading_messages = false;
                    self.selection.mark_read(&ticket.conversation_id);
                } else {
                    tracing::debug!(
                        conversation_id = %ticket.conversation_id,
                        "Selection moved during fetch; merged into background thread"
                    );
                }
                Ok(())
            }
            Err(e) => {
                if current {
                    tracing::warn!(conversation_id = %ticket.conversation_id, error = %e, "Failed to load messages");
                    self.loading_messages = false;
                    self.error_messages = Some(e.clone());
                } else {
                    tracing::debug!(
                        conversation_id = %ticket.conversation_id,
                        error = %e,
                        "Ignoring failure of a superseded fetch"
                    );
                }
                Err(e)
            }
        }
    }

    /// Create and merge an optimistic message for the active conversation
    pub fn begin_send(
        &mut self,
        content: String,
        attachment: Option<Attachment>,
    ) -> Result<(String, SendMessageRequest)> {
        let conversation_id = self
            .selection
            .active_id()
            .ok_or(Error::NoActiveConversation)?
            .to_string();
        let sender_id = self.user_id.clone().unwrap_or_default();

        let timestamp = self.next_local_timestamp();
        let optimistic = Message::optimistic(
            conversation_id.clone(),
            sender_id,
            content.clone(),
            attachment.clone(),
            timestamp,
        )?;
        let temp_id = optimistic.id.clone();
        let preview = optimistic.preview();

        let outgoing = OutgoingSend {
            conversation_id: conversation_id.clone(),
            content,
            attachment,
        };
        let request = outgoing.to_request(&temp_id);
        self.outbox.insert(temp_id.clone(), outgoing);

        self.threads
            .entry(conversation_id.clone())
            .or_default()
            .merge(vec![optimistic], None);
        if let Err(e) =
            self.selection
                .update_conversation_summary(&conversation_id, preview, timestamp, 0)
        {
            tracing::warn!(error = %e, "Could not refresh conversation summary");
        }

        self.sends_in_flight += 1;
        self.error_send = None;
        tracing::debug!(conversation_id = %conversation_id, temp_id = %temp_id, "Optimistic message queued");
        Ok((temp_id, request))
    }

    /// Put a failed message back to pending and rebuild its request
    pub fn begin_retry(&mut self, temp_id: &str) -> Result<SendMessageRequest> {
        let outgoing = self
            .outbox
            .get(temp_id)
            .cloned()
            .ok_or_else(|| StateError::Untracked(temp_id.to_string()))?;

        self.threads
            .entry(outgoing.conversation_id.clone())
            .or_default()
            .mark_retrying(temp_id)?;

        self.sends_in_flight += 1;
        self.error_send = None;
        tracing::debug!(temp_id = %temp_id, "Retrying message");
        Ok(outgoing.to_request(temp_id))
    }

    pub fn finish_send(&mut self, temp_id: &str, result: Result<Message>) -> Result<Message> {
        self.sends_in_flight = self.sends_in_flight.saturating_sub(1);

        let Some(outgoing) = self.outbox.get(temp_id).cloned() else {
            tracing::debug!(temp_id = %temp_id, "Send resolved after state reset; dropping result");
            return result;
        };
        let thread = self
            .threads
            .entry(outgoing.conversation_id.clone())
            .or_default();

        match result {
            Ok(confirmed) => {
                let server_id = confirmed.id.clone();
                thread.reconcile(temp_id, confirmed.clone())?;
                self.outbox.remove(temp_id);
                tracing::debug!(temp_id = %temp_id, message_id = %server_id, "Message confirmed");
                Ok(thread.get(&server_id).cloned().unwrap_or(confirmed))
            }
            Err(e) => {
                if thread.get(temp_id).is_none() {
                    // The optimistic entry is gone: a push or page fetch
                    // already delivered the server copy
                    self.outbox.remove(temp_id);
                    if let Some(delivered) = thread.confirmed_for(temp_id).cloned() {
                        tracing::info!(
                            temp_id = %temp_id,
                            message_id = %delivered.id,
                            error = %e,
                            "Send failed after the message was delivered"
                        );
                        return Ok(delivered);
                    }
                    tracing::warn!(temp_id = %temp_id, error = %e, "Message send failed for a removed message");
                    self.error_send = Some(e.clone());
                    return Err(e);
                }

                tracing::warn!(temp_id = %temp_id, error = %e, "Message send failed");
                thread.mark_failed(temp_id, e.to_string())?;
                self.error_send = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Drop a failed optimistic message
    pub fn discard(&mut self, temp_id: &str) -> Result<()> {
        let outgoing = self
            .outbox
            .get(temp_id)
            .ok_or_else(|| StateError::Untracked(temp_id.to_string()))?;
        self.threads
            .get_mut(&outgoing.conversation_id)
            .ok_or_else(|| StateError::Untracked(temp_id.to_string()))?
            .discard(temp_id)?;
        self.outbox.remove(temp_id);
        Ok(())
    }

    /// Merge a message pushed by the server. Returns whether it landed in
    /// the active view.
    pub fn receive(&mut self, message: Message) -> Result<bool> {
        let conversation_id = message.conversation_id.clone();
        let thread = self.threads.entry(conversation_id.clone()).or_default();
        let duplicate = thread.get(&message.id).is_some();
        let own = self.user_id.as_deref() == Some(message.sender_id.as_str());
        let preview = message.preview();
        let timestamp = message.created_at;

        thread.merge(vec![message], None);

        if !self.selection.contains(&conversation_id) {
            tracing::debug!(conversation_id = %conversation_id, "Message for unlisted conversation kept in background");
            return Ok(false);
        }

        let unread_delta = if duplicate || own { 0 } else { 1 };
        self.selection
            .update_conversation_summary(&conversation_id, preview, timestamp, unread_delta)?;
        Ok(self.selection.is_active(&conversation_id))
    }

    pub fn messages_for(&self, conversation_id: &str) -> Vec<Message> {
        self.threads
            .get(conversation_id)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> MessagingSnapshot {
        let active_id = self.selection.active_id().map(str::to_string);
        let thread = active_id.as_deref().and_then(|id| self.threads.get(id));

        MessagingSnapshot {
            user_id: self.user_id.clone(),
            conversations: self.selection.conversations().to_vec(),
            active_conversation: self.selection.active_conversation().cloned(),
            active_conversation_id: active_id,
            messages: thread.map(|t| t.messages().to_vec()).unwrap_or_default(),
            has_older_messages: thread.is_some_and(|t| t.next_cursor().is_some()),
            loading_conversations: self.loading_conversations,
            loading_messages: self.loading_messages,
            sending: self.sends_in_flight > 0,
            error_conversations: self.error_conversations.clone(),
            error_messages: self.error_messages.clone(),
            error_send: self.error_send.clone(),
        }
    }

    /// Strictly increasing local clock so rapid sends keep call order
    fn next_local_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_local_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_local_timestamp = Some(timestamp);
        timestamp
    }

    fn reset(&mut self) {
        self.session += 1;
        self.selection.clear();
        self.threads.clear();
        self.outbox.clear();
        self.selection_epoch += 1;
        self.loading_messages = false;
        self.error_messages = None;
        self.error_send = None;
    }
}
