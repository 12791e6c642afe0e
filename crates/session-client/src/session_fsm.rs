//! Session state machine using rust-fsm.
//!
//! The session status is tracked by an explicit finite state machine
//! rather than derived from which tokens happen to be present.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    SignedOut    │ (initial)
//! └────────┬────────┘
//!          │ LoginAttempt            SessionRestored
//!          ▼                                │
//! ┌─────────────────┐                       │
//! │ Authenticating  │                       │
//! └────────┬────────┘                       │
//!          │ LoginSucceeded / LoginFailed   │
//!          ▼                                ▼
//! ┌─────────────────┐    TokenRejected    ┌─────────────────┐
//! │  Authenticated  │ ──────────────────► │   Refreshing    │
//! └────────┬────────┘                     └────────┬────────┘
//!          │ SignOut                               │ RefreshSucceeded ──► Authenticated
//!          ▼                                       │ RefreshFailed
//!      SignedOut                                   ▼
//!                                          ┌─────────────────┐
//!                                          │     Expired     │ ─ LoginAttempt / SignOut ─►
//!                                          └─────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Define the FSM using rust-fsm's declarative macro
// This generates a module `session_machine` with:
// - session_machine::State (enum)
// - session_machine::Input (enum)
// - session_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        LoginAttempt => Authenticating,
        SessionRestored => Authenticated
    },
    Authenticating => {
        LoginSucceeded => Authenticated,
        LoginFailed => SignedOut
    },
    Authenticated => {
        TokenRejected => Refreshing,
        SignOut => SignedOut
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshRetry => Refreshing,
        RefreshFailed => Expired
    },
    Expired => {
        LoginAttempt => Authenticating,
        SignOut => SignedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session status for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No tokens held.
    SignedOut,
    /// A login call is in flight.
    Authenticating,
    /// Holding an access token believed to be valid.
    Authenticated,
    /// A refresh is in flight after the server rejected the access token.
    Refreshing,
    /// The token pair is dead; the caller must re-authenticate.
    Expired,
}

impl SessionStatus {
    /// Returns true if calls requiring authentication can be attempted.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    /// Returns true if the status is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionStatus::Authenticating | SessionStatus::Refreshing)
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => SessionStatus::SignedOut,
            SessionMachineState::Authenticating => SessionStatus::Authenticating,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Refreshing => SessionStatus::Refreshing,
            SessionMachineState::Expired => SessionStatus::Expired,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts against the refresh endpoint.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms.saturating_mul(2u64.pow(attempt));
        let capped_ms = delay_ms.min(self.max_delay_ms);
        Duration::from_millis(capped_ms)
    }
}

/// Payload for session status change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedPayload {
    /// Current session status.
    pub status: SessionStatus,
    /// Account the session belongs to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
