//! chat_client - Transport for the streaming chat service
//!
//! - `frame` - incremental decoder for the `data: ...\n\n` wire framing
//! - `transport` - the `ChatTransport` seam, stream events and handles
//! - `client` - reqwest implementation plus the blocking and health calls

pub mod client;
pub mod error;
pub mod frame;
pub mod models;
pub mod transport;

pub use client::ChatClient;
pub use error::{Result, TransportError};
pub use frame::{DecodedChunk, FrameDecoder, DONE_SENTINEL};
pub use models::{ChatResponse, HealthStatus};
pub use transport::{ChatTransport, OpenedStream, StreamEvent, StreamHandle};
