//! Gigboard client composition root
//!
//! Wires the messaging facade and the escrow boundary from configuration.

use std::sync::Arc;

use gigboard_escrow::{EscrowConfig, EscrowService, EscrowServiceFactory};
use gigboard_messaging::{ConversationsApi, ConversationsApiFactory, MessagingConfig, MessagingFacade};

/// Facade over whichever messaging backend the configuration selects
pub type DynMessagingFacade = MessagingFacade<dyn ConversationsApi>;

/// Services shared by every view of the client
pub struct GigboardApp {
    pub messaging: Arc<DynMessagingFacade>,
    pub escrow: Arc<dyn EscrowService>,
}

/// Build the application from already-loaded service configuration.
/// The facade and the HTTP client share the messaging request timeout.
pub fn create_app(
    messaging_config: MessagingConfig,
    escrow_config: EscrowConfig,
) -> Result<GigboardApp, anyhow::Error> {
    let request_timeout = messaging_config.request_timeout;
    let api: Arc<dyn ConversationsApi> =
        Arc::from(ConversationsApiFactory::create(messaging_config)?);
    let escrow: Arc<dyn EscrowService> = Arc::from(EscrowServiceFactory::create(escrow_config)?);

    let messaging = MessagingFacade::with_timeout(api, request_timeout);

    Ok(GigboardApp {
        messaging: Arc::new(messaging),
        escrow,
    })
}
