//! State machine module
//!
//! Contains the FSM for the session request/reply lifecycle.

mod events;
mod states;
mod transitions;

pub use events::SessionEvent;
pub use states::SessionState;
pub use transitions::{StateMachine, StateTransition, TransitionError};
