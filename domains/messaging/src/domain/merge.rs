//! Message ordering & merge engine
//!
//! Produces a deterministic per-conversation sequence from the last known
//! sequence and an incoming batch. Sequences are ordered by
//! `(created_at, id)` and never contain two entries with the same id.

use std::collections::HashMap;

use super::entities::Message;
use super::state::{SendEvent, SendState, SendStateMachine, StateError};

/// Merge `incoming` into `existing`.
///
/// `replaces` names the temporary id that a send response confirms. An
/// incoming message whose `client_ref` points at a local optimistic entry
/// replaces that entry as well, so a page fetch racing a send never shows
/// the message twice.
pub fn merge_messages(
    existing: &[Message],
    incoming: Vec<Message>,
    replaces: Option<&str>,
) -> Vec<Message> {
    let mut working: HashMap<String, Message> = existing
        .iter()
        .map(|m| (m.id.clone(), m.clone()))
        .collect();

    for message in incoming {
        if let Some(temp_id) = replaces {
            if temp_id != message.id {
                working.remove(temp_id);
            }
        }

        if let Some(client_ref) = message.client_ref.as_deref() {
            if client_ref != message.id
                && working.get(client_ref).is_some_and(Message::is_optimistic)
            {
                working.remove(client_ref);
            }
        }

        working.insert(message.id.clone(), message);
    }

    let mut merged: Vec<Message> = working.into_values().collect();
    sort_messages(&mut merged);
    merged
}

/// Sort by timestamp ascending, id ascending as tie-break
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Per-conversation message state held by the facade
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageThread {
    messages: Vec<Message>,
    /// Cursor for the next (older) page, as handed out by the server
    next_cursor: Option<String>,
    /// Whether at least one page has been fetched successfully
    loaded: bool,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Server copy of a message sent under the temporary id `temp_id`
    pub fn confirmed_for(&self, temp_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| !m.is_optimistic() && m.client_ref.as_deref() == Some(temp_id))
    }

    /// Merge the newest page. The cursor is only taken on the first load so
    /// a refresh does not rewind older-page pagination.
    pub fn apply_latest_page(&mut self, page: Vec<Message>, next_cursor: Option<String>) {
        self.merge(page, None);
        if !self.loaded {
            self.next_cursor = next_cursor;
        }
        self.loaded = true;
    }

    /// Merge an older page and advance the cursor
    pub fn apply_older_page(&mut self, page: Vec<Message>, next_cursor: Option<String>) {
        self.merge(page, None);
        self.next_cursor = next_cursor;
        self.loaded = true;
    }

    pub fn merge(&mut self, incoming: Vec<Message>, replaces: Option<&str>) {
        self.messages = merge_messages(&self.messages, incoming, replaces);
    }

    /// Replace the optimistic message `temp_id` with its server-confirmed
    /// counterpart.
    ///
    /// The confirmed message keeps the send-time timestamp of the optimistic
    /// entry so rapid sends stay in call order regardless of which response
    /// arrives first. A later page fetch carries the server's own timestamp.
    pub fn reconcile(&mut self, temp_id: &str, mut confirmed: Message) -> Result<(), StateError> {
        if let Some(optimistic) = self.get(temp_id) {
            let next = SendStateMachine::transition(&optimistic.send_state, SendEvent::Confirm)?;
            confirmed.created_at = optimistic.created_at;
            confirmed.send_state = next;
        } else {
            // Already replaced by a page fetch carrying the same client_ref
            confirmed.send_state = SendState::Confirmed;
        }
        if confirmed.client_ref.is_none() {
            confirmed.client_ref = Some(temp_id.to_string());
        }
        self.merge(vec![confirmed], Some(temp_id));
        Ok(())
    }

    /// Mark an optimistic message failed in place. It is never removed here.
    pub fn mark_failed(&mut self, temp_id: &str, reason: impl Into<String>) -> Result<(), StateError> {
        self.transition(
            temp_id,
            SendEvent::Fail {
                reason: reason.into(),
            },
        )
    }

    /// Move a failed message back to pending for another attempt
    pub fn mark_retrying(&mut self, temp_id: &str) -> Result<(), StateError> {
        self.transition(temp_id, SendEvent::Retry)
    }

    /// Drop a failed optimistic message at the user's request
    pub fn discard(&mut self, temp_id: &str) -> Result<Message, StateError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == temp_id)
            .ok_or_else(|| StateError::Untracked(temp_id.to_string()))?;
        if !self.messages[index].send_state.is_failed() {
            return Err(StateError::InvalidTransition {
                from: self.messages[index].send_state.to_string(),
                event: "discard".to_string(),
            });
        }
        Ok(self.messages.remove(index))
    }

    fn transition(&mut self, temp_id: &str, event: SendEvent) -> Result<(), StateError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == temp_id)
            .ok_or_else(|| StateError::Untracked(temp_id.to_string()))?;
        message.send_state = SendStateMachine::transition(&message.send_state, event)?;
        Ok(())
    }
}
