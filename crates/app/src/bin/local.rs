// Gigboard messaging - local driver
//
// Loads configuration from the environment, initializes the messaging
// facade for GIGBOARD_USER_ID and optionally selects a conversation
// (GIGBOARD_CONVERSATION_ID) and sends a message (GIGBOARD_SEND).

use tracing::{error, info, warn};

use gigboard_common::{telemetry, Config};
use gigboard_escrow::EscrowConfig;
use gigboard_messaging::MessagingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(&config);

    info!("Starting Gigboard messaging driver");

    let messaging_config = MessagingConfig::from_env().map_err(|e| {
        error!("Failed to load messaging configuration: {}", e);
        e
    })?;
    let escrow_config = EscrowConfig::from_env()?;
    info!(config = ?messaging_config, "Configuration loaded successfully");

    let app = gigboard_app::create_app(messaging_config, escrow_config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    let user_id = std::env::var("GIGBOARD_USER_ID")
        .map_err(|_| anyhow::anyhow!("GIGBOARD_USER_ID is required"))?;

    app.messaging.initialize(&user_id).await?;

    let snapshot = app.messaging.snapshot().await;
    info!(count = snapshot.conversations.len(), "Conversations loaded");
    for conversation in &snapshot.conversations {
        let with: Vec<&str> = conversation
            .counterparts(&user_id)
            .map(|p| p.display_name.as_str())
            .collect();
        info!(
            conversation_id = %conversation.id,
            with = %with.join(", "),
            unread = conversation.unread_count,
            "Conversation"
        );
    }

    let Ok(conversation_id) = std::env::var("GIGBOARD_CONVERSATION_ID") else {
        return Ok(());
    };

    if let Err(e) = app.messaging.select_conversation(&conversation_id).await {
        warn!(conversation_id = %conversation_id, error = %e, "Could not load messages");
    }

    if let Ok(content) = std::env::var("GIGBOARD_SEND") {
        match app.messaging.send(&content, None).await {
            Ok(message) => info!(message_id = %message.id, "Message sent"),
            Err(e) => warn!(error = %e, "Message send failed"),
        }
    }

    for message in app.messaging.snapshot().await.messages {
        info!(
            message_id = %message.id,
            sender = %message.sender_id,
            at = %message.created_at,
            state = %message.send_state,
            "{}",
            message.preview()
        );
    }

    info!("Done");
    Ok(())
}
