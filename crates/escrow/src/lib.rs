//! Gigboard Escrow Service
//!
//! Boundary to the third-party escrow provider. The provider is opaque to
//! Gigboard; only two operations cross the boundary:
//! - `deploy_escrow`: lock a milestone payment in a new escrow
//! - `release_funds`: pay out an escrow to the freelancer
//!
//! Implementations: HTTP client for the provider API, and a mock that
//! records calls for tests and local development.

pub mod client;
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Escrow configuration error: {0}")]
    Configuration(String),

    #[error("Escrow request error: {0}")]
    Request(String),

    #[error("Escrow rejected operation: {0}")]
    Rejected(String),
}

impl From<EscrowError> for gigboard_common::Error {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::Configuration(msg) => gigboard_common::Error::Configuration(msg),
            EscrowError::Request(msg) => gigboard_common::Error::Network(msg),
            EscrowError::Rejected(msg) => gigboard_common::Error::Server {
                status: 422,
                message: msg,
            },
        }
    }
}

/// Opaque payload forwarded to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowPayload {
    /// Marketplace reference (contract or milestone id)
    pub reference: String,
    /// Provider-specific fields, passed through untouched
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Provider acknowledgement of a successful operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowReceipt {
    pub reference: String,
    /// Provider-side identifier (escrow address, transaction id)
    pub provider_ref: String,
}

/// Escrow service configuration
#[derive(Clone)]
pub struct EscrowConfig {
    /// Escrow provider (http, mock)
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for EscrowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl EscrowConfig {
    /// Create escrow config from environment variables
    pub fn from_env() -> Result<Self, EscrowError> {
        let provider = std::env::var("ESCROW_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let base_url = std::env::var("ESCROW_API_URL")
            .unwrap_or_else(|_| "http://localhost:8400".to_string());
        let api_key = std::env::var("ESCROW_API_KEY").unwrap_or_default();

        if provider != "mock" && api_key.is_empty() {
            return Err(EscrowError::Configuration(
                "ESCROW_API_KEY is required for the http provider".to_string(),
            ));
        }

        Ok(Self {
            provider,
            base_url,
            api_key,
        })
    }
}

/// Escrow service trait for different providers
#[async_trait::async_trait]
pub trait EscrowService: Send + Sync {
    async fn deploy_escrow(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError>;

    async fn release_funds(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError>;
}

/// Factory for creating EscrowService implementations
pub struct EscrowServiceFactory;

impl EscrowServiceFactory {
    pub fn create(config: EscrowConfig) -> Result<Box<dyn EscrowService>, EscrowError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!("Creating HTTP escrow client");
                if config.api_key.is_empty() {
                    return Err(EscrowError::Configuration(
                        "ESCROW_API_KEY is required for the http provider".to_string(),
                    ));
                }
                Ok(Box::new(client::HttpEscrowClient::new(config)))
            }
            "mock" => {
                tracing::info!("Creating mock escrow service");
                Ok(Box::new(mock::MockEscrowService::new()))
            }
            provider => Err(EscrowError::Configuration(format!(
                "Unknown escrow provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
