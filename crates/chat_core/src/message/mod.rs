//! Message module - Transcript message types
//!
//! Shared message types used across the system.

mod types;

pub use types::{Message, Role, WireMessage};
