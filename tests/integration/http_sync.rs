//! Messaging facade over the HTTP repository against a stub backend

use std::sync::Arc;
use std::time::Duration;

use gigboard_common::Error;
use gigboard_messaging::{
    is_temp_id, ConversationsApi, ConversationsApiFactory, HttpConversationsClient, MessagingConfig,
    MessagingFacade, SendState,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> MessagingConfig {
    MessagingConfig {
        provider: "http".to_string(),
        api_base_url: format!("{}/v1", server.uri()),
        api_token: Some("integration-token".to_string()),
        request_timeout: Duration::from_secs(2),
    }
}

fn facade_for(server: &MockServer) -> MessagingFacade<HttpConversationsClient> {
    let client = HttpConversationsClient::new(config_for(server)).unwrap();
    MessagingFacade::new(Arc::new(client))
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data}))
}

fn conversation_json(id: &str, unread: u32) -> Value {
    json!({
        "id": id,
        "participants": [{"id": "freelancer-3", "name": "Grace", "isOnline": false}],
        "lastMessage": {"content": "Draft is ready", "timestamp": "2026-03-01T09:00:00Z"},
        "unreadCount": unread,
        "serviceId": "svc-4"
    })
}

fn message_json(id: &str, created_at: &str, content: &str) -> Value {
    json!({
        "id": id,
        "conversationId": "conv-1",
        "senderId": "freelancer-3",
        "content": content,
        "createdAt": created_at,
        "status": "read"
    })
}

async fn mount_conversations(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/conversations"))
        .and(query_param("userId", "user-1"))
        .respond_with(ok(json!([
            conversation_json("conv-1", 1),
            conversation_json("conv-2", 0)
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_missing_conversation_list_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/conversations"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "User has no conversations"
        })))
        .mount(&server)
        .await;

    let facade = facade_for(&server);
    facade.initialize("user-1").await.unwrap();

    let snapshot = facade.snapshot().await;
    assert!(snapshot.conversations.is_empty());
    assert!(snapshot.error_conversations.is_none());
}

#[tokio::test]
async fn test_send_reconciles_and_refetch_is_idempotent() {
    let server = MockServer::start().await;
    mount_conversations(&server).await;

    // First fetch sees only the freelancer's message; later ones include ours
    Mock::given(method("GET"))
        .and(path("/v1/conversations/conv-1/messages"))
        .respond_with(ok(json!({
            "messages": [message_json("m-1", "2026-03-01T09:00:00Z", "Draft is ready")],
            "nextCursor": null
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/conversations/conv-1/messages"))
        .and(body_partial_json(json!({"content": "Looks great"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": {
                    "id": "m-2",
                    "conversationId": "conv-1",
                    "senderId": "user-1",
                    "content": "Looks great",
                    "createdAt": "2026-03-01T09:05:00Z",
                    "status": "sent"
                }
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let facade = facade_for(&server);
    facade.initialize("user-1").await.unwrap();
    facade.select_conversation("conv-1").await.unwrap();
    assert_eq!(facade.snapshot().await.conversations[0].unread_count, 0);

    let confirmed = facade.send("Looks great", None).await.unwrap();
    assert_eq!(confirmed.id, "m-2");
    assert!(confirmed.client_ref.as_deref().is_some_and(is_temp_id));

    let sent: Value = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    let client_ref = sent["clientRef"].as_str().unwrap().to_string();
    assert_eq!(confirmed.client_ref.as_deref(), Some(client_ref.as_str()));

    let mut with_reply = message_json("m-2", "2026-03-01T09:05:00Z", "Looks great");
    with_reply["senderId"] = json!("user-1");
    with_reply["clientRef"] = json!(client_ref);
    Mock::given(method("GET"))
        .and(path("/v1/conversations/conv-1/messages"))
        .respond_with(ok(json!({
            "messages": [
                message_json("m-1", "2026-03-01T09:00:00Z", "Draft is ready"),
                with_reply
            ],
            "nextCursor": null
        })))
        .mount(&server)
        .await;

    let before = facade.snapshot().await.messages;
    facade.select_conversation("conv-1").await.unwrap();
    facade.select_conversation("conv-1").await.unwrap();
    let after = facade.snapshot().await.messages;

    let ids = |messages: &[gigboard_messaging::Message]| -> Vec<String> {
        messages.iter().map(|m| m.id.clone()).collect()
    };
    assert_eq!(ids(&before), vec!["m-1", "m-2"]);
    assert_eq!(ids(&after), vec!["m-1", "m-2"]);
    assert!(after.iter().all(|m| m.send_state == SendState::Confirmed));
}

#[tokio::test]
async fn test_server_failure_then_retry_over_http() {
    let server = MockServer::start().await;
    mount_conversations(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/conversations/conv-2/messages"))
        .respond_with(ok(json!({"messages": [], "nextCursor": null})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/conversations/conv-2/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "success": false,
            "message": "Messaging temporarily unavailable"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/conversations/conv-2/messages"))
        .respond_with(ok(json!({
            "id": "m-7",
            "conversationId": "conv-2",
            "senderId": "user-1",
            "content": "Invoice attached",
            "createdAt": "2026-03-02T12:00:00Z"
        })))
        .mount(&server)
        .await;

    let facade = facade_for(&server);
    facade.initialize("user-1").await.unwrap();
    facade.select_conversation("conv-2").await.unwrap();

    let err = facade.send("Invoice attached", None).await.unwrap_err();
    assert_eq!(
        err,
        Error::Server {
            status: 503,
            message: "Messaging temporarily unavailable".to_string()
        }
    );

    let failed = facade.snapshot().await.messages;
    assert_eq!(failed.len(), 1);
    assert!(failed[0].send_state.is_failed());

    let confirmed = facade.retry(&failed[0].id).await.unwrap();
    let messages = facade.snapshot().await.messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, confirmed.id);
    assert_eq!(confirmed.id, "m-7");
}

#[tokio::test]
async fn test_factory_builds_http_facade() {
    let server = MockServer::start().await;
    mount_conversations(&server).await;

    let api = ConversationsApiFactory::create(config_for(&server)).unwrap();
    let facade: MessagingFacade<dyn ConversationsApi> = MessagingFacade::new(Arc::from(api));
    facade.initialize("user-1").await.unwrap();

    let snapshot = facade.snapshot().await;
    let ids: Vec<&str> = snapshot.conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["conv-1", "conv-2"]);
}
