//! chat_state - Session controller and FSM for streaming chat
//!
//! This crate owns the conversation transcript and drives it from the
//! signals of the chat transport: one in-flight reply at a time, appended
//! increment by increment, settled as completed, cancelled or failed.

pub mod machine;
pub mod session;
pub mod update;

// Re-export commonly used types
pub use machine::{SessionEvent, SessionState, StateMachine, StateTransition, TransitionError};
pub use session::{ChatSession, SendError, FAILURE_NOTICE};
pub use update::{SessionUpdate, Settlement};
