//! Session events - Inputs that drive state transitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    // ========== User Events ==========
    /// User submitted a message and a stream was opened.
    UserMessageSent,

    /// User cancelled the in-flight reply.
    UserCancelled,

    // ========== Stream Events ==========
    /// An increment arrived.
    StreamChunkReceived,

    /// The stream ended normally.
    StreamEnded,

    /// The stream failed.
    StreamFailed,
}
