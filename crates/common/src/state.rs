//! Common state machine error types
//!
//! Shared by every crate that tracks a lifecycle (outgoing sends, escrow).

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot go from {from} via {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Terminal state: {0} cannot transition")]
    TerminalState(String),

    /// No tracked entity exists under the given key
    #[error("Untracked: {0}")]
    Untracked(String),
}
