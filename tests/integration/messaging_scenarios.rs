//! End-to-end behavior of the messaging facade over the mock backend
//!
//! Interleavings are driven with mock gates: a held call stays pending until
//! its gate is released, so the order in which results arrive is fixed by
//! the test rather than by the scheduler.

use gigboard_common::{Error, StateError};
use gigboard_messaging::{is_temp_id, MockCall, SendState};

mod common;

use common::{
    contents, conversation, server_message, wait_until, TestMessaging, USER_ID,
};

mod test_selection {
    use super::*;

    #[tokio::test]
    async fn test_selection_survives_failed_fetch() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2", "conv-3"]).await;
        assert_eq!(messaging.facade.snapshot().await.conversations.len(), 3);

        messaging.api.fail_next(
            MockCall::FetchMessages("conv-2".to_string()),
            Error::Network("connection reset".to_string()),
        );
        let err = messaging
            .facade
            .select_conversation("conv-2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.active_conversation_id.as_deref(), Some("conv-2"));
        assert!(matches!(snapshot.error_messages, Some(Error::Network(_))));
        assert!(!snapshot.loading_messages);
    }

    #[tokio::test]
    async fn test_reinitialize_keeps_selection_when_still_listed() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-2").await.unwrap();

        messaging.facade.initialize(USER_ID).await.unwrap();
        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.active_conversation_id.as_deref(), Some("conv-2"));
        assert_eq!(snapshot.active_conversation.unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_reinitialize_clears_selection_when_removed() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-2").await.unwrap();

        messaging
            .api
            .set_conversations(USER_ID, vec![conversation("conv-1")]);
        messaging.facade.initialize(USER_ID).await.unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert!(snapshot.active_conversation_id.is_none());
        assert!(snapshot.messages.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_selection_keeps_current() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let err = messaging
            .facade
            .select_conversation("conv-9")
            .await
            .unwrap_err();
        assert_eq!(err, Error::Selection("conv-9".to_string()));
        assert_eq!(
            messaging.facade.snapshot().await.active_conversation_id.as_deref(),
            Some("conv-1")
        );
    }

    #[tokio::test]
    async fn test_selecting_resets_unread() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let snapshot = messaging.facade.snapshot().await;
        let unread: Vec<u32> = snapshot.conversations.iter().map(|c| c.unread_count).collect();
        assert_eq!(unread, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_replace_active_messages() {
        let messaging = TestMessaging::initialized(&["conv-a", "conv-b"]).await;
        let gate = messaging
            .api
            .hold_next(MockCall::FetchMessages("conv-a".to_string()));

        let slow = tokio::spawn({
            let facade = messaging.facade.clone();
            async move { facade.select_conversation("conv-a").await }
        });
        let api = messaging.api.clone();
        wait_until(|| {
            api.recorded_calls()
                .contains(&MockCall::FetchMessages("conv-a".to_string()))
        })
        .await;

        messaging.facade.select_conversation("conv-b").await.unwrap();
        gate.release();
        slow.await.unwrap().unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.active_conversation_id.as_deref(), Some("conv-b"));
        assert_eq!(contents(&snapshot.messages), vec!["hello from conv-b"]);

        // The late page still lands in A's background thread, unread untouched
        let background = messaging.facade.messages_for("conv-a").await;
        assert_eq!(contents(&background), vec!["hello from conv-a"]);
        let conv_a = snapshot
            .conversations
            .iter()
            .find(|c| c.id == "conv-a")
            .unwrap();
        assert_eq!(conv_a.unread_count, 2);
    }
}

mod test_initialize {
    use super::*;

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let messaging = TestMessaging::with_conversations(&["conv-1", "conv-2", "conv-3"]);
        messaging
            .api
            .set_conversations("user-2", vec![conversation("conv-9")]);
        let gate = messaging.api.hold_next(MockCall::ListConversations);

        let slow = tokio::spawn({
            let facade = messaging.facade.clone();
            async move { facade.initialize(USER_ID).await }
        });
        let api = messaging.api.clone();
        wait_until(|| !api.recorded_calls().is_empty()).await;

        messaging.facade.initialize("user-2").await.unwrap();
        gate.release();
        slow.await.unwrap().unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.user_id.as_deref(), Some("user-2"));
        let ids: Vec<&str> = snapshot.conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["conv-9"]);
        assert!(!snapshot.loading_conversations);
    }

    #[tokio::test]
    async fn test_fetch_in_flight_during_user_switch_is_dropped() {
        let messaging = TestMessaging::initialized(&["conv-a", "conv-b"]).await;
        messaging
            .api
            .set_conversations("user-2", vec![conversation("conv-z")]);
        let gate = messaging
            .api
            .hold_next(MockCall::FetchMessages("conv-a".to_string()));

        let slow = tokio::spawn({
            let facade = messaging.facade.clone();
            async move { facade.select_conversation("conv-a").await }
        });
        let api = messaging.api.clone();
        wait_until(|| {
            api.recorded_calls()
                .contains(&MockCall::FetchMessages("conv-a".to_string()))
        })
        .await;

        messaging.facade.initialize("user-2").await.unwrap();
        gate.release();
        let err = slow.await.unwrap().unwrap_err();
        assert_eq!(err, Error::Selection("conv-a".to_string()));

        assert!(messaging.facade.messages_for("conv-a").await.is_empty());
        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.user_id.as_deref(), Some("user-2"));
        assert!(snapshot.active_conversation_id.is_none());
        assert!(snapshot.error_messages.is_none());
    }

    #[tokio::test]
    async fn test_empty_user_is_rejected() {
        let messaging = TestMessaging::with_conversations(&["conv-1"]);
        let err = messaging.facade.initialize("").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(messaging.api.recorded_calls().is_empty());
    }
}

mod test_sending {
    use super::*;

    #[tokio::test]
    async fn test_send_without_selection() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;

        let err = messaging.facade.send("hello", None).await.unwrap_err();
        assert_eq!(err, Error::NoActiveConversation);

        let snapshot = messaging.facade.snapshot().await;
        assert!(snapshot.messages.is_empty());
        assert!(messaging.facade.messages_for("conv-1").await.is_empty());
        assert!(messaging.api.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_send_creates_nothing() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let err = messaging.facade.send("   ", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(messaging.facade.snapshot().await.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_sends_keep_call_order_when_resolved_out_of_order() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.api.set_messages("conv-1", Vec::new());
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let gate = messaging
            .api
            .hold_next(MockCall::SendMessage("conv-1".to_string()));
        let first = tokio::spawn({
            let facade = messaging.facade.clone();
            async move { facade.send("hi", None).await }
        });
        let api = messaging.api.clone();
        wait_until(|| api.sent_requests().len() == 1).await;

        // "there" resolves while "hi" is still held
        let second = messaging.facade.send("there", None).await.unwrap();
        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(contents(&snapshot.messages), vec!["hi", "there"]);
        assert!(snapshot.messages[0].send_state.is_pending());

        gate.release();
        let first = first.await.unwrap().unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(contents(&snapshot.messages), vec!["hi", "there"]);
        let ids: Vec<&str> = snapshot.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
        assert!(snapshot.messages.iter().all(|m| !is_temp_id(&m.id)));
        assert!(!snapshot.sending);
    }

    #[tokio::test]
    async fn test_failed_send_then_retry() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.api.set_messages("conv-1", Vec::new());
        messaging.facade.select_conversation("conv-1").await.unwrap();

        messaging.api.fail_next(
            MockCall::SendMessage("conv-1".to_string()),
            Error::Server {
                status: 503,
                message: "unavailable".to_string(),
            },
        );
        let err = messaging.facade.send("hello", None).await.unwrap_err();
        assert!(err.is_retryable());

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.messages[0].send_state.is_failed());
        assert!(snapshot.error_send.is_some());
        let temp_id = snapshot.messages[0].id.clone();

        let gate = messaging
            .api
            .hold_next(MockCall::SendMessage("conv-1".to_string()));
        let retry = tokio::spawn({
            let facade = messaging.facade.clone();
            let temp_id = temp_id.clone();
            async move { facade.retry(&temp_id).await }
        });
        let api = messaging.api.clone();
        wait_until(|| api.sent_requests().len() == 2).await;

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].id, temp_id);
        assert_eq!(snapshot.messages[0].send_state, SendState::Pending { attempt: 2 });

        gate.release();
        let confirmed = retry.await.unwrap().unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].id, confirmed.id);
        assert_eq!(snapshot.messages[0].send_state, SendState::Confirmed);
        assert!(snapshot.error_send.is_none());

        // Both attempts carried the same correlation token
        let refs: Vec<_> = messaging
            .api
            .sent_requests()
            .into_iter()
            .map(|r| r.client_ref)
            .collect();
        assert_eq!(refs, vec![Some(temp_id.clone()), Some(temp_id.clone())]);

        let err = messaging.facade.retry(&temp_id).await.unwrap_err();
        assert!(matches!(err, Error::State(StateError::Untracked(_))));
    }

    #[tokio::test]
    async fn test_send_timing_out_after_echo_resolves_to_echo() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.api.set_messages("conv-1", Vec::new());
        messaging.facade.select_conversation("conv-1").await.unwrap();

        // Never released: the send times out on the client
        let _gate = messaging
            .api
            .hold_next(MockCall::SendMessage("conv-1".to_string()));
        let pending = tokio::spawn({
            let facade = messaging.facade.clone();
            async move { facade.send("on it", None).await }
        });
        let api = messaging.api.clone();
        wait_until(|| api.sent_requests().len() == 1).await;

        let temp_id = messaging.facade.snapshot().await.messages[0].id.clone();
        let mut echo = server_message("conv-1", "srv-echo", 0, "on it");
        echo.sender_id = USER_ID.to_string();
        echo.client_ref = Some(temp_id.clone());
        messaging.facade.receive(echo).await.unwrap();

        let delivered = pending.await.unwrap().unwrap();
        assert_eq!(delivered.id, "srv-echo");

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(contents(&snapshot.messages), vec!["on it"]);
        assert_eq!(snapshot.messages[0].send_state, SendState::Confirmed);
        assert!(snapshot.error_send.is_none());
        assert!(!snapshot.sending);

        let err = messaging.facade.retry(&temp_id).await.unwrap_err();
        assert!(matches!(err, Error::State(StateError::Untracked(_))));
    }

    #[tokio::test]
    async fn test_discard_failed_send() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();
        messaging.api.fail_next(
            MockCall::SendMessage("conv-1".to_string()),
            Error::Network("offline".to_string()),
        );
        assert!(messaging.facade.send("lost", None).await.is_err());
        let temp_id = messaging.facade.snapshot().await.messages[1].id.clone();

        messaging.facade.discard(&temp_id).await.unwrap();
        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(contents(&snapshot.messages), vec!["hello from conv-1"]);
        assert!(messaging.facade.discard(&temp_id).await.is_err());
    }

    #[tokio::test]
    async fn test_refetch_after_send_is_idempotent() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();
        let confirmed = messaging.facade.send("deal", None).await.unwrap();
        assert!(!is_temp_id(&confirmed.id));
        assert!(confirmed.client_ref.as_deref().is_some_and(is_temp_id));

        let before = messaging.facade.snapshot().await.messages;
        messaging.facade.select_conversation("conv-2").await.unwrap();
        messaging.facade.select_conversation("conv-1").await.unwrap();
        let after = messaging.facade.snapshot().await.messages;

        let ids = |messages: &[gigboard_messaging::Message]| -> Vec<String> {
            messages.iter().map(|m| m.id.clone()).collect()
        };
        assert_eq!(ids(&before), ids(&after));
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn test_send_moves_conversation_to_front() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-2").await.unwrap();
        messaging.facade.send("on my way", None).await.unwrap();

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.conversations[0].id, "conv-2");
        assert_eq!(
            snapshot.conversations[0].last_message.as_ref().unwrap().content,
            "on my way"
        );
    }
}

mod test_receive {
    use super::*;

    #[tokio::test]
    async fn test_background_message_bumps_unread() {
        let messaging = TestMessaging::initialized(&["conv-1", "conv-2"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let pushed = server_message("conv-2", "push-1", 60, "new offer");
        assert!(!messaging.facade.receive(pushed.clone()).await.unwrap());
        // Same message delivered twice counts once
        assert!(!messaging.facade.receive(pushed).await.unwrap());

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(snapshot.conversations[0].id, "conv-2");
        assert_eq!(snapshot.conversations[0].unread_count, 3);
        assert_eq!(messaging.facade.messages_for("conv-2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_active_message_stays_read() {
        let messaging = TestMessaging::initialized(&["conv-1"]).await;
        messaging.facade.select_conversation("conv-1").await.unwrap();

        let pushed = server_message("conv-1", "push-1", 60, "see attached");
        assert!(messaging.facade.receive(pushed).await.unwrap());

        let snapshot = messaging.facade.snapshot().await;
        assert_eq!(
            contents(&snapshot.messages),
            vec!["hello from conv-1", "see attached"]
        );
        assert_eq!(snapshot.conversations[0].unread_count, 0);
    }
}
