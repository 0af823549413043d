//! Message - A single entry of the conversation transcript
//!
//! Messages are created finalized (user input, seeded greetings) or as an
//! empty streaming placeholder for an assistant reply. A placeholder is the
//! only kind of message whose content may still change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    streaming: bool,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(role: Role, content: String, streaming: bool) -> Self {
        Self {
            id: generate_id(),
            role,
            content,
            created_at: Utc::now(),
            streaming,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), false)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), false)
    }

    /// Empty assistant message that receives streamed increments.
    pub fn assistant_placeholder() -> Self {
        Self::new(Role::Assistant, String::new(), true)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Append an increment. Finalized messages are never changed.
    pub fn append(&mut self, delta: &str) -> bool {
        if !self.streaming {
            log::warn!("Ignoring append to finalized message {}", self.id);
            return false;
        }
        self.content.push_str(delta);
        true
    }

    /// Replace the whole content of a streaming message.
    pub fn replace_content(&mut self, content: impl Into<String>) -> bool {
        if !self.streaming {
            log::warn!("Ignoring replace on finalized message {}", self.id);
            return false;
        }
        self.content = content.into();
        true
    }

    /// Mark the message as complete. Content is frozen from here on.
    pub fn finalize(&mut self) {
        self.streaming = false;
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// The `{role, content}` shape sent in a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}
