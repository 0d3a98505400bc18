//! Escrow HTTP Client Implementation
//!
//! POSTs payloads to `{base_url}/escrows` and
//! `{base_url}/escrows/release`, authenticated with an API key header.

use serde::Deserialize;

use crate::{EscrowConfig, EscrowError, EscrowPayload, EscrowReceipt, EscrowService};

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the escrow provider API
pub struct HttpEscrowClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpEscrowClient {
    pub fn new(config: EscrowConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    async fn post(&self, path: &str, payload: &EscrowPayload) -> Result<EscrowReceipt, EscrowError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| EscrowError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EscrowError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(EscrowError::Request(format!(
                "Escrow API returned {}: {}",
                status, body
            )));
        }

        let parsed: ProviderResponse = serde_json::from_str(&body)
            .map_err(|e| EscrowError::Request(format!("Failed to parse response: {}", e)))?;

        if !parsed.success {
            return Err(EscrowError::Rejected(
                parsed
                    .message
                    .unwrap_or_else(|| "operation rejected".to_string()),
            ));
        }

        let provider_ref = parsed
            .id
            .ok_or_else(|| EscrowError::Request("Response missing id".to_string()))?;

        tracing::debug!(reference = %payload.reference, provider_ref = %provider_ref, path, "Escrow operation accepted");
        Ok(EscrowReceipt {
            reference: payload.reference.clone(),
            provider_ref,
        })
    }
}

#[async_trait::async_trait]
impl EscrowService for HttpEscrowClient {
    async fn deploy_escrow(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError> {
        self.post("/escrows", &payload).await
    }

    async fn release_funds(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError> {
        self.post("/escrows/release", &payload).await
    }
}
