//! Messaging facade
//!
//! The single orchestration surface the UI depends on. It owns the
//! conversation list, the active selection and every per-conversation
//! message thread; views read snapshots and call the methods below.
//!
//! Remote calls run without holding the state lock, so operations may
//! interleave. Each one captures a ticket before its call and checks it on
//! completion, discarding results that were overtaken.

mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use gigboard_common::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use gigboard_common::{Error, Result};

use crate::domain::entities::{Attachment, Message};
use crate::repository::ConversationsApi;

pub use store::MessagingSnapshot;
use store::MessagingStore;

pub struct MessagingFacade<A: ConversationsApi + ?Sized> {
    api: Arc<A>,
    store: RwLock<MessagingStore>,
    request_timeout: Duration,
}

impl<A: ConversationsApi + ?Sized> MessagingFacade<A> {
    /// Create a facade with the default 30 second request timeout
    pub fn new(api: Arc<A>) -> Self {
        Self::with_timeout(api, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(api: Arc<A>, request_timeout: Duration) -> Self {
        Self {
            api,
            store: RwLock::new(MessagingStore::new()),
            request_timeout,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Load the conversation list for `user_id`. A newer call supersedes
    /// this one; the superseded result is dropped when it arrives.
    pub async fn initialize(&self, user_id: &str) -> Result<()> {
        let generation = self.store.write().await.begin_initialize(user_id);
        tracing::info!(user_id = %user_id, generation, "Loading conversations");

        let result = self.call(self.api.list_conversations(user_id)).await;
        self.store.write().await.finish_initialize(generation, result)
    }

    /// Make a conversation active and fetch its newest messages.
    ///
    /// The selection changes even when the fetch fails; the failure shows up
    /// in `error_messages`. Unknown ids fail with `Error::Selection` and
    /// leave the selection untouched.
    pub async fn select_conversation(&self, conversation_id: &str) -> Result<()> {
        let ticket = self.store.write().await.begin_select(conversation_id)?;
        tracing::debug!(conversation_id = %conversation_id, "Conversation selected");

        let result = self
            .call(self.api.fetch_messages(&ticket.conversation_id, None))
            .await;
        self.store.write().await.finish_fetch(ticket, result)
    }

    /// Fetch the next older page of the active conversation. Returns `false`
    /// when the history is already exhausted.
    pub async fn load_older_messages(&self) -> Result<bool> {
        let Some(ticket) = self.store.write().await.begin_load_older()? else {
            return Ok(false);
        };

        let result = self
            .call(
                self.api
                    .fetch_messages(&ticket.conversation_id, ticket.cursor.as_deref()),
            )
            .await;
        self.store.write().await.finish_fetch(ticket, result)?;
        Ok(true)
    }

    /// Send a message to the active conversation.
    ///
    /// An optimistic `Pending` message is visible immediately. On success it
    /// is replaced by the confirmed message, which is returned; on failure it
    /// stays in the thread as `Failed` and the error is returned.
    pub async fn send(&self, content: &str, attachment: Option<Attachment>) -> Result<Message> {
        let (temp_id, request) = self
            .store
            .write()
            .await
            .begin_send(content.to_string(), attachment)?;

        let result = self.call(self.api.send_message(request)).await;
        self.store.write().await.finish_send(&temp_id, result)
    }

    /// Send a failed message again under the same temporary id
    pub async fn retry(&self, temp_id: &str) -> Result<Message> {
        let request = self.store.write().await.begin_retry(temp_id)?;

        let result = self.call(self.api.send_message(request)).await;
        self.store.write().await.finish_send(temp_id, result)
    }

    /// Remove a failed message the user gave up on
    pub async fn discard(&self, temp_id: &str) -> Result<()> {
        self.store.write().await.discard(temp_id)
    }

    /// Merge a message delivered outside a fetch (push or poll). Returns
    /// whether it belongs to the active conversation, i.e. whether the view
    /// should scroll.
    pub async fn receive(&self, message: Message) -> Result<bool> {
        self.store.write().await.receive(message)
    }

    pub async fn snapshot(&self) -> MessagingSnapshot {
        self.store.read().await.snapshot()
    }

    /// Messages of any conversation, including background ones
    pub async fn messages_for(&self, conversation_id: &str) -> Vec<Message> {
        self.store.read().await.messages_for(conversation_id)
    }

    /// Apply the client-side timeout to a remote call
    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.request_timeout, "Remote call timed out");
                Err(Error::Network(format!(
                    "request timed out after {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}
