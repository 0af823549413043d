use chat_core::WireMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::TransportError;

/// Signal delivered by a streaming exchange, in arrival order.
///
/// At most one of `Done` / `Failed` is sent and nothing follows it. An
/// aborted exchange sends neither: its channel simply closes.
#[derive(Debug)]
pub enum StreamEvent {
    Chunk(String),
    Done,
    Failed(TransportError),
}

/// Cancellation capability for exactly one exchange.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Uuid,
    token: CancellationToken,
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation. Idempotent, and a no-op once the exchange settled.
    pub fn abort(&self) {
        if !self.token.is_cancelled() {
            log::debug!("[{}] Abort requested", self.id);
            self.token.cancel();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A started exchange: its handle plus the ordered event channel.
#[derive(Debug)]
pub struct OpenedStream {
    pub handle: StreamHandle,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
}

/// Opens streaming exchanges with the chat service.
///
/// `open` must not block: implementations spawn the exchange and return at
/// once. The messages are the full reply context, oldest first.
pub trait ChatTransport: Send + Sync {
    fn open(&self, messages: Vec<WireMessage>) -> OpenedStream;
}
