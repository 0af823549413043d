//! chat_core - Core types for the chat client
//!
//! This crate provides the foundational types used across all chat-related crates:
//! - `message` - Message, Role and the wire shape of a transcript entry
//! - `config` - Client configuration layered from defaults, file and env

pub mod config;
pub mod message;

// Re-export commonly used types
pub use config::{Config, ConfigError, DEFAULT_API_URL, DEFAULT_GREETING};
pub use message::{Message, Role, WireMessage};
