//! Mock Escrow Service Implementation
//!
//! Records every call and succeeds unless told to reject.
//! Thread-safe via `Arc<Mutex<>>`.

use crate::{EscrowError, EscrowPayload, EscrowReceipt, EscrowService};
use std::sync::{Arc, Mutex};

/// Which operation a recorded call was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowOperation {
    Deploy,
    Release,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<(EscrowOperation, EscrowPayload)>,
    reject_with: Option<String>,
}

/// Mock escrow service that records calls for test assertions
#[derive(Debug, Clone, Default)]
pub struct MockEscrowService {
    state: Arc<Mutex<MockState>>,
}

impl MockEscrowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following call with `reason`
    pub fn reject_with(&self, reason: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_with = Some(reason.into());
        }
    }

    /// Return all recorded calls
    pub fn recorded_calls(&self) -> Vec<(EscrowOperation, EscrowPayload)> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    fn record(
        &self,
        operation: EscrowOperation,
        payload: EscrowPayload,
    ) -> Result<EscrowReceipt, EscrowError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EscrowError::Request(format!("mock state lock poisoned: {e}")))?;
        tracing::debug!(?operation, reference = %payload.reference, "Mock escrow: recording call");

        let index = state.calls.len() + 1;
        let reference = payload.reference.clone();
        state.calls.push((operation, payload));

        if let Some(reason) = &state.reject_with {
            return Err(EscrowError::Rejected(reason.clone()));
        }

        Ok(EscrowReceipt {
            reference,
            provider_ref: format!("mock-{:?}-{}", operation, index).to_lowercase(),
        })
    }
}

#[async_trait::async_trait]
impl EscrowService for MockEscrowService {
    async fn deploy_escrow(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError> {
        self.record(EscrowOperation::Deploy, payload)
    }

    async fn release_funds(&self, payload: EscrowPayload) -> Result<EscrowReceipt, EscrowError> {
        self.record(EscrowOperation::Release, payload)
    }
}
