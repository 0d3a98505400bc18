//! Shared fixtures for messaging integration tests
//!
//! - conversation and message builders
//! - a facade wired to the in-memory mock backend
//! - polling helper for interleaving tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use gigboard_messaging::{
    Conversation, DeliveryStatus, Message, MessagingFacade, MockConversationsApi, Participant,
    SendState,
};

pub const USER_ID: &str = "user-1";

/// Timeout used by test facades; short so hung calls fail fast
pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

pub fn conversation(id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        participants: vec![
            Participant {
                id: USER_ID.to_string(),
                display_name: "Client".to_string(),
                avatar_url: None,
                online: true,
            },
            Participant {
                id: format!("freelancer-of-{}", id),
                display_name: "Freelancer".to_string(),
                avatar_url: Some("https://cdn.example.com/avatar.png".to_string()),
                online: false,
            },
        ],
        last_message: None,
        unread_count: 2,
        link: None,
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
}

pub fn server_message(conversation_id: &str, id: &str, secs: i64, content: &str) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: format!("freelancer-of-{}", conversation_id),
        content: content.to_string(),
        attachment: None,
        created_at: at(secs),
        delivery: DeliveryStatus::Delivered,
        client_ref: None,
        send_state: SendState::Confirmed,
    }
}

pub struct TestMessaging {
    pub api: Arc<MockConversationsApi>,
    pub facade: Arc<MessagingFacade<MockConversationsApi>>,
}

impl TestMessaging {
    /// Mock backend seeded with `ids`, each holding one message
    pub fn with_conversations(ids: &[&str]) -> Self {
        let api = Arc::new(MockConversationsApi::new());
        api.set_conversations(USER_ID, ids.iter().map(|id| conversation(id)).collect());
        for id in ids {
            api.set_messages(
                id,
                vec![server_message(id, &format!("{}-m1", id), 0, &format!("hello from {}", id))],
            );
        }
        let facade = Arc::new(MessagingFacade::with_timeout(api.clone(), TEST_TIMEOUT));
        Self { api, facade }
    }

    pub async fn initialized(ids: &[&str]) -> Self {
        let messaging = Self::with_conversations(ids);
        messaging.facade.initialize(USER_ID).await.unwrap();
        messaging
    }
}

/// Poll `condition` until it holds, panicking after one second
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 1s");
}

pub fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}
