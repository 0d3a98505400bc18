//! State machine for outgoing message sends
//!
//! Send states: Pending → Confirmed | Failed, Failed → Pending (retry)

pub use gigboard_common::StateError;
use serde::{Deserialize, Serialize};

/// Local send state of a message. Server-originated messages are `Confirmed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SendState {
    /// Waiting on the server; `attempt` starts at 1
    Pending { attempt: u32 },
    #[default]
    Confirmed,
    /// Kept visible so the user can retry or discard
    Failed { reason: String, attempt: u32 },
}

impl SendState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Attempt counter, zero for server-originated messages
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Pending { attempt } | Self::Failed { attempt, .. } => *attempt,
            Self::Confirmed => 0,
        }
    }
}

impl std::fmt::Display for SendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending { .. } => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Events that trigger send state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum SendEvent {
    /// Server persisted the message
    Confirm,
    /// Transport or server failure
    Fail { reason: String },
    /// User asked to send a failed message again
    Retry,
}

impl std::fmt::Display for SendEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirm => write!(f, "confirm"),
            Self::Fail { .. } => write!(f, "fail"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// Send state machine
pub struct SendStateMachine;

impl SendStateMachine {
    /// Attempt a state transition
    pub fn transition(current: &SendState, event: SendEvent) -> Result<SendState, StateError> {
        match (current, event) {
            (SendState::Pending { .. }, SendEvent::Confirm) => Ok(SendState::Confirmed),
            (SendState::Pending { attempt }, SendEvent::Fail { reason }) => Ok(SendState::Failed {
                reason,
                attempt: *attempt,
            }),
            (SendState::Failed { attempt, .. }, SendEvent::Retry) => Ok(SendState::Pending {
                attempt: attempt.saturating_add(1),
            }),
            (SendState::Confirmed, _) => Err(StateError::TerminalState(current.to_string())),
            (_, event) => Err(StateError::InvalidTransition {
                from: current.to_string(),
                event: event.to_string(),
            }),
        }
    }
}
