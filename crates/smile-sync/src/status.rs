//! Connection status state machine
//!
//! State transitions:
//! ```text
//! Disconnected → Connecting → Live
//!                     ↓
//!                   Error
//! ```
//!
//! `Error` holds until the process restarts; the admin view surfaces the
//! stored message and invites reconfiguration but never retries on its own.

use serde::{Deserialize, Serialize};

/// The state of the remote connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No usable configuration; local data only
    Disconnected,
    /// Anonymous sign-in and subscription attach in flight
    Connecting,
    /// Subscription active; remote writes are attempted
    Live,
    /// Identity bootstrap or subscription attach failed
    Error,
}

impl ConnectionState {
    /// Check if a state transition is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        matches!(
            (self, target),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Live)
                | (ConnectionState::Connecting, ConnectionState::Error)
        )
    }

    /// Whether remote writes are attempted in this state
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Live)
    }

    /// Check if the state is terminal (no recovery without restart)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Live | ConnectionState::Error)
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Demo Mode (Not Connected)",
            ConnectionState::Connecting => "Connecting to the live database",
            ConnectionState::Live => "Logged In (Firebase Live)",
            ConnectionState::Error => "Database Not Connected",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Live => write!(f, "LIVE"),
            ConnectionState::Error => write!(f, "ERROR"),
        }
    }
}

/// Connection state plus the last surfaced error message, the pair the
/// admin banner renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    /// Whether the backend is configured and remote writes are attempted.
    pub fn is_configured(&self) -> bool {
        self.state.is_live()
    }

    /// Banner line for the admin view, or `None` when live with no error.
    pub fn banner(&self) -> Option<String> {
        match (&self.state, &self.last_error) {
            (ConnectionState::Live, None) => None,
            (ConnectionState::Live, Some(err)) => Some(err.clone()),
            (state, Some(err)) => Some(format!("{}. {}", state.description(), err)),
            (state, None) => Some(state.description().to_string()),
        }
    }
}
