//! HTTP implementation of the conversation repository
//!
//! Talks to the marketplace REST backend. Every response body is a
//! `{success, data, message}` envelope; wire DTOs are adapted into the
//! canonical domain entities here and nowhere else.
//!
//! Routes:
//! - `GET  {base}/conversations?userId={id}`
//! - `GET  {base}/conversations/{id}/messages[?cursor=...]`
//! - `POST {base}/conversations/{id}/messages`

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use gigboard_common::{Error, Result};

use super::{
    validate_conversation_id, validate_user_id, ConversationsApi, MessagePage, MessagingConfig,
    SendMessageRequest,
};
use crate::domain::entities::{
    validate_outgoing, Attachment, Conversation, ConversationLink, DeliveryStatus, LastMessage,
    Message, Participant, UploadStatus,
};
use crate::domain::state::SendState;

/// Response envelope used by every backend endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDto {
    id: String,
    name: String,
    avatar: Option<String>,
    #[serde(default)]
    is_online: bool,
}

#[derive(Debug, Deserialize)]
struct LastMessageDto {
    content: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationDto {
    id: String,
    participants: Vec<ParticipantDto>,
    last_message: Option<LastMessageDto>,
    #[serde(default)]
    unread_count: u32,
    project_id: Option<String>,
    service_id: Option<String>,
    dispute_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttachmentDto {
    name: String,
    size: u64,
    url: Option<String>,
    #[serde(default)]
    status: UploadStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDto {
    id: String,
    conversation_id: String,
    sender_id: String,
    #[serde(default)]
    content: String,
    attachment: Option<AttachmentDto>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    status: DeliveryStatus,
    client_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePageDto {
    messages: Vec<MessageDto>,
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ref: Option<&'a str>,
}

impl From<ConversationDto> for Conversation {
    fn from(dto: ConversationDto) -> Self {
        let link = match (dto.dispute_id, dto.project_id, dto.service_id) {
            (Some(id), _, _) => Some(ConversationLink::Dispute(id)),
            (None, Some(id), _) => Some(ConversationLink::Project(id)),
            (None, None, Some(id)) => Some(ConversationLink::Service(id)),
            (None, None, None) => None,
        };

        Conversation {
            id: dto.id,
            participants: dto
                .participants
                .into_iter()
                .map(|p| Participant {
                    id: p.id,
                    display_name: p.name,
                    avatar_url: p.avatar,
                    online: p.is_online,
                })
                .collect(),
            last_message: dto.last_message.map(|m| LastMessage {
                content: m.content,
                timestamp: m.timestamp,
            }),
            unread_count: dto.unread_count,
            link,
        }
    }
}

impl From<AttachmentDto> for Attachment {
    fn from(dto: AttachmentDto) -> Self {
        Attachment {
            name: dto.name,
            size: dto.size,
            url: dto.url,
            status: dto.status,
        }
    }
}

impl From<&Attachment> for AttachmentDto {
    fn from(attachment: &Attachment) -> Self {
        AttachmentDto {
            name: attachment.name.clone(),
            size: attachment.size,
            url: attachment.url.clone(),
            status: attachment.status,
        }
    }
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        Message {
            id: dto.id,
            conversation_id: dto.conversation_id,
            sender_id: dto.sender_id,
            content: dto.content,
            attachment: dto.attachment.map(Attachment::from),
            created_at: dto.created_at,
            delivery: dto.status,
            client_ref: dto.client_ref,
            send_state: SendState::Confirmed,
        }
    }
}

/// reqwest-backed conversation repository
pub struct HttpConversationsClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpConversationsClient {
    /// Create a new client. The configured timeout applies per request.
    pub fn new(config: MessagingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            Error::Configuration(format!(
                "Invalid MESSAGING_API_URL {}: {}",
                config.api_base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "MESSAGING_API_URL cannot be used as a base: {}",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Configuration("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Network("request timed out".to_string())
    } else {
        Error::Network(format!("HTTP request failed: {}", err))
    }
}

/// Unwrap an envelope, mapping the status and `success` flag onto the error
/// taxonomy. 404 maps to `NotFound`; callers decide whether that is empty.
async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(resource.to_string()));
    }

    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.clone()
                }
            });
        return Err(Error::Server {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| Error::Server {
        status: status.as_u16(),
        message: format!("Malformed response body: {}", e),
    })?;

    if !envelope.success {
        return Err(Error::Server {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "request failed".to_string()),
        });
    }

    envelope.data.ok_or_else(|| Error::Server {
        status: status.as_u16(),
        message: "Response envelope has no data".to_string(),
    })
}

#[async_trait::async_trait]
impl ConversationsApi for HttpConversationsClient {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        validate_user_id(user_id)?;

        let url = self.endpoint(&["conversations"])?;
        tracing::debug!(user_id = %user_id, "Listing conversations");

        let response = self
            .authorize(self.client.get(url).query(&[("userId", user_id)]))
            .send()
            .await
            .map_err(transport_error)?;

        let rows = match read_envelope::<Vec<ConversationDto>>(response, "conversations").await {
            Ok(rows) => rows,
            Err(Error::NotFound(_)) => {
                tracing::debug!(user_id = %user_id, "No conversations for user");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let conversations = rows
            .into_iter()
            .map(Conversation::from)
            .filter(|c| match c.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(conversation_id = %c.id, error = %e, "Skipping invalid conversation");
                    false
                }
            })
            .collect();

        Ok(conversations)
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage> {
        validate_conversation_id(conversation_id)?;

        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        tracing::debug!(conversation_id = %conversation_id, cursor = ?cursor, "Fetching messages");

        let mut request = self.client.get(url);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        let page: MessagePageDto =
            read_envelope(response, &format!("conversation {}", conversation_id)).await?;

        let mut messages: Vec<Message> = page.messages.into_iter().map(Message::from).collect();
        crate::domain::merge::sort_messages(&mut messages);

        Ok(MessagePage {
            messages,
            next_cursor: page.next_cursor,
        })
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message> {
        validate_conversation_id(&request.conversation_id)?;
        validate_outgoing(&request.content, request.attachment.as_ref())?;

        let url = self.endpoint(&["conversations", &request.conversation_id, "messages"])?;
        let body = SendMessageBody {
            content: &request.content,
            attachment: request.attachment.as_ref().map(AttachmentDto::from),
            client_ref: request.client_ref.as_deref(),
        };

        tracing::debug!(
            conversation_id = %request.conversation_id,
            client_ref = ?request.client_ref,
            "Sending message"
        );

        let response = self
            .authorize(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(transport_error)?;

        let dto: MessageDto = read_envelope(
            response,
            &format!("conversation {}", request.conversation_id),
        )
        .await?;

        let mut message = Message::from(dto);
        if message.client_ref.is_none() {
            message.client_ref = request.client_ref;
        }
        Ok(message)
    }
}
