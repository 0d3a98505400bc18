//! Domain entities for the Messaging domain
//!
//! One canonical shape for conversations and messages. Wire formats are
//! adapted into these types at the repository boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gigboard_common::{Error, Result};

use super::state::SendState;

/// Prefix of client-generated temporary message ids
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Conversation participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub online: bool,
}

/// Summary of the most recent message, for list rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// What a conversation is attached to, if anything
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ConversationLink {
    Project(String),
    Service(String),
    Dispute(String),
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub link: Option<ConversationLink>,
}

impl Conversation {
    /// Check entity invariants
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation("Conversation id is required".to_string()));
        }
        if self.participants.is_empty() {
            return Err(Error::Validation(format!(
                "Conversation {} has no participants",
                self.id
            )));
        }
        Ok(())
    }

    /// Timestamp of the latest activity, if any
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.timestamp)
    }

    /// Participants other than `user_id`, for list-row titles
    pub fn counterparts<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Participant> {
        self.participants.iter().filter(move |p| p.id != user_id)
    }
}

/// Upload status of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Pending,
    Uploaded,
    Failed,
}

/// Attachment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    pub url: Option<String>,
    #[serde(default)]
    pub status: UploadStatus,
}

/// Delivery status, for local display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Read => write!(f, "read"),
        }
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Back-reference for lookup only
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivery: DeliveryStatus,
    /// Temporary id of the optimistic message this one confirms
    #[serde(default)]
    pub client_ref: Option<String>,
    #[serde(skip, default)]
    pub send_state: SendState,
}

impl Message {
    /// Build a client-side optimistic message in the `Pending` state
    pub fn optimistic(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: String,
        attachment: Option<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        validate_outgoing(&content, attachment.as_ref())?;

        let id = new_temp_id();
        Ok(Message {
            client_ref: Some(id.clone()),
            id,
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            content,
            attachment,
            created_at,
            delivery: DeliveryStatus::Sent,
            send_state: SendState::Pending { attempt: 1 },
        })
    }

    /// Whether this message only exists locally
    pub fn is_optimistic(&self) -> bool {
        is_temp_id(&self.id)
    }

    /// Ordering key: timestamp first, id as tie-break
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }

    /// Short text for list-row summaries
    pub fn preview(&self) -> String {
        match (&self.attachment, self.content.is_empty()) {
            (Some(a), true) => format!("[attachment] {}", a.name),
            _ => self.content.clone(),
        }
    }
}

/// Reject sends with neither text nor attachment
pub fn validate_outgoing(content: &str, attachment: Option<&Attachment>) -> Result<()> {
    if content.trim().is_empty() && attachment.is_none() {
        return Err(Error::Validation(
            "Message must have content or an attachment".to_string(),
        ));
    }
    Ok(())
}

pub fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
