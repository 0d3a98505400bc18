//! Messaging domain: conversation list, active selection, message threads
//! and optimistic sends, kept in sync with the marketplace REST backend.

pub mod domain;
pub mod facade;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{
    is_temp_id, Attachment, Conversation, ConversationLink, DeliveryStatus, LastMessage, Message,
    Participant, UploadStatus,
};
pub use domain::merge::{merge_messages, MessageThread};
pub use domain::selection::ConversationSelection;
pub use domain::state::{SendEvent, SendState, SendStateMachine, StateError};

// Re-export repository types
pub use repository::{
    ConversationsApi, ConversationsApiFactory, HttpConversationsClient, MessagePage,
    MessagingConfig, MockCall, MockConversationsApi, MockGate, SendMessageRequest,
};

// Re-export facade types
pub use facade::{MessagingFacade, MessagingSnapshot};
