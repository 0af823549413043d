//! Session states - Lifecycle of the single in-flight exchange

use serde::{Deserialize, Serialize};

/// Where a session is in its request/reply cycle.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No exchange in flight; the session accepts input.
    #[default]
    Idle,

    /// Request sent, no content received yet.
    AwaitingFirstByte,

    /// Receiving increments for the assistant reply.
    Streaming,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
        assert!(!SessionState::default().is_busy());
    }

    #[test]
    fn test_busy_states() {
        assert!(SessionState::AwaitingFirstByte.is_busy());
        assert!(SessionState::Streaming.is_busy());
    }
}
