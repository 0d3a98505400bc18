//! Conversation selection state
//!
//! Owns the authoritative conversation list and the single active id.

use chrono::{DateTime, Utc};

use gigboard_common::{Error, Result};

use super::entities::{Conversation, LastMessage};

#[derive(Debug, Clone, Default)]
pub struct ConversationSelection {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    /// Set once the active conversation's message page has been fetched
    active_read: bool,
}

impl ConversationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.get(conversation_id).is_some()
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active_id.as_deref() == Some(conversation_id)
    }

    /// Replace the list. The active selection survives only if its id is
    /// still present.
    pub fn set_conversations(&mut self, list: Vec<Conversation>) {
        self.conversations = list;

        let still_present = self
            .active_id
            .as_deref()
            .is_some_and(|id| self.conversations.iter().any(|c| c.id == id));

        if !still_present {
            if let Some(id) = self.active_id.take() {
                tracing::debug!(conversation_id = %id, "Active conversation no longer listed, clearing selection");
            }
            self.active_read = false;
        } else if self.active_read {
            self.zero_active_unread();
        }
    }

    /// Make `conversation_id` active. Unknown ids leave the selection as is.
    pub fn select(&mut self, conversation_id: &str) -> Result<()> {
        if !self.contains(conversation_id) {
            return Err(Error::Selection(conversation_id.to_string()));
        }
        if !self.is_active(conversation_id) {
            self.active_id = Some(conversation_id.to_string());
            self.active_read = false;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.active_id = None;
        self.active_read = false;
    }

    /// Record that the active conversation's messages were fetched
    pub fn mark_read(&mut self, conversation_id: &str) {
        if self.is_active(conversation_id) {
            self.active_read = true;
            self.zero_active_unread();
        }
    }

    /// Refresh a list row after a message event without refetching the list.
    /// The row moves to the front so the list stays most-recent-first.
    pub fn update_conversation_summary(
        &mut self,
        conversation_id: &str,
        last_message: String,
        timestamp: DateTime<Utc>,
        unread_delta: i64,
    ) -> Result<()> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| Error::Selection(conversation_id.to_string()))?;

        let read = self.active_read && self.is_active(conversation_id);
        let mut conversation = self.conversations.remove(index);

        let is_newer = conversation
            .last_activity()
            .map_or(true, |current| timestamp >= current);
        if is_newer {
            conversation.last_message = Some(LastMessage {
                content: last_message,
                timestamp,
            });
        }

        conversation.unread_count = if read {
            0
        } else {
            apply_delta(conversation.unread_count, unread_delta)
        };

        let position = if is_newer { 0 } else { index };
        self.conversations.insert(position, conversation);
        Ok(())
    }

    fn zero_active_unread(&mut self) {
        if let Some(id) = self.active_id.clone() {
            if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) {
                conversation.unread_count = 0;
            }
        }
    }
}

fn apply_delta(current: u32, delta: i64) -> u32 {
    let next = i64::from(current).saturating_add(delta);
    next.clamp(0, i64::from(u32::MAX)) as u32
}
