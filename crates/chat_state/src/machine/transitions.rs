//! State transitions - FSM transition logic
//!
//! Implements the state machine that handles event-driven state transitions.

use thiserror::Error;

use super::events::SessionEvent;
use super::states::SessionState;

/// Error type for invalid state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event:?}")]
    InvalidTransition {
        from: SessionState,
        event: SessionEvent,
    },
}

/// Represents a state transition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: SessionState,
    /// The state after the transition.
    pub to: SessionState,
    /// The event that triggered the transition.
    pub event: SessionEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for the session lifecycle.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current_state: SessionState,
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// Handle an event. Invalid events leave the state untouched.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<StateTransition, TransitionError> {
        let from = self.current_state;
        let to = Self::compute_next_state(from, event).ok_or(TransitionError::InvalidTransition {
            from,
            event,
        })?;

        self.current_state = to;
        Ok(StateTransition {
            from,
            to,
            event,
            changed: from != to,
        })
    }

    fn compute_next_state(state: SessionState, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (state, event) {
            (Idle, UserMessageSent) => Some(AwaitingFirstByte),

            (AwaitingFirstByte | Streaming, StreamChunkReceived) => Some(Streaming),

            (AwaitingFirstByte | Streaming, StreamEnded | StreamFailed | UserCancelled) => {
                Some(Idle)
            }

            _ => None,
        }
    }
}
