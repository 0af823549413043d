//! Chat session - sole owner and writer of the transcript
//!
//! A [`ChatSession`] binds user intent (`send`, `cancel`) to the signals of
//! one streaming exchange at a time. Every transition mutates the transcript
//! and the state machine under a single lock, so readers never observe a
//! half-applied update. Signals from a stream that is no longer the active
//! one are discarded, which resolves the race between a user abort and a
//! final chunk already in flight: whichever takes the lock first wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_client::{ChatTransport, StreamEvent, StreamHandle};
use chat_core::{Message, WireMessage};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

use crate::machine::{SessionEvent, SessionState, StateMachine};
use crate::update::{SessionUpdate, Settlement};

/// Content written over a reply whose stream failed.
pub const FAILURE_NOTICE: &str = "Sorry, I encountered an error. Please try again later.";

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("A reply is already in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,
}

struct Inner {
    transcript: Vec<Message>,
    machine: StateMachine,
    active: Option<StreamHandle>,
}

struct Shared {
    inner: Mutex<Inner>,
    transport: Arc<dyn ChatTransport>,
    updates: broadcast::Sender<SessionUpdate>,
    state_tx: watch::Sender<SessionState>,
}

/// Handle to one chat session. Clones share the same transcript.
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ChatSession")
            .field("state", &inner.machine.state())
            .field("messages", &inner.transcript.len())
            .finish()
    }
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_transcript(transport, Vec::new())
    }

    /// Start from existing messages, e.g. a greeting. They are finalized.
    pub fn with_transcript(transport: Arc<dyn ChatTransport>, initial: Vec<Message>) -> Self {
        let transcript = initial
            .into_iter()
            .map(|mut message| {
                message.finalize();
                message
            })
            .collect();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    transcript,
                    machine: StateMachine::new(),
                    active: None,
                }),
                transport,
                updates,
                state_tx,
            }),
        }
    }

    /// Snapshot of the transcript, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().transcript.clone()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.shared.lock().transcript.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().machine.state()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.shared.updates.subscribe()
    }

    /// Resolves once no exchange is in flight.
    pub async fn wait_idle(&self) {
        let mut state_rx = self.shared.state_tx.subscribe();
        let _ = state_rx.wait_for(|state| !state.is_busy()).await;
    }

    /// Submit user input and start streaming the reply.
    ///
    /// Rejected without touching the transcript when `content` is blank or
    /// a reply is already in flight. Must be called inside a tokio runtime.
    pub fn send(&self, content: impl Into<String>) -> Result<(), SendError> {
        let content = content.into();
        if content.trim().is_empty() {
            log::debug!("Rejecting empty message");
            return Err(SendError::EmptyMessage);
        }

        let (stream_id, events) = {
            let mut inner = self.shared.lock();
            if inner.machine.handle_event(SessionEvent::UserMessageSent).is_err() {
                log::debug!("Rejecting message while {:?}", inner.machine.state());
                return Err(SendError::Busy);
            }

            let user = Message::user(content);
            inner.transcript.push(user.clone());
            let context: Vec<WireMessage> = inner.transcript.iter().map(Message::to_wire).collect();

            let placeholder = Message::assistant_placeholder();
            inner.transcript.push(placeholder.clone());

            let opened = self.shared.transport.open(context);
            let stream_id = opened.handle.id();
            inner.active = Some(opened.handle);

            log::debug!(
                "[{}] Stream opened for reply {} ({} messages)",
                stream_id,
                placeholder.id,
                inner.transcript.len()
            );

            self.shared.publish_state(inner.machine.state());
            let _ = self
                .shared
                .updates
                .send(SessionUpdate::MessageAppended { message: user });
            let _ = self.shared.updates.send(SessionUpdate::MessageAppended {
                message: placeholder,
            });

            (stream_id, opened.events)
        };

        tokio::spawn(drive_stream(self.shared.clone(), stream_id, events));
        Ok(())
    }

    /// Abort the in-flight reply, keeping whatever content arrived.
    ///
    /// Returns `false` when nothing was in flight.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.lock();
        let Some(handle) = inner.active.take() else {
            return false;
        };

        handle.abort();
        log::debug!("[{}] Stream cancelled by user", handle.id());
        self.shared
            .settle(&mut inner, SessionEvent::UserCancelled, Settlement::Cancelled);
        true
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Apply one stream signal. Returns `true` once the stream is no longer
    /// live, so the caller stops reading.
    fn apply(&self, stream_id: Uuid, event: StreamEvent) -> bool {
        let mut inner = self.lock();
        if inner.active.as_ref().map(StreamHandle::id) != Some(stream_id) {
            log::debug!("[{}] Discarding signal from settled stream", stream_id);
            return true;
        }

        match event {
            StreamEvent::Chunk(delta) => {
                let Some(message) = inner.transcript.last_mut() else {
                    return true;
                };
                if !message.append(&delta) {
                    return false;
                }
                let message_id = message.id.clone();

                if let Ok(transition) = inner.machine.handle_event(SessionEvent::StreamChunkReceived) {
                    if transition.changed {
                        self.publish_state(transition.to);
                    }
                }
                let _ = self
                    .updates
                    .send(SessionUpdate::ContentAppended { message_id, delta });
                false
            }
            StreamEvent::Done => {
                inner.active = None;
                self.settle(&mut inner, SessionEvent::StreamEnded, Settlement::Completed);
                true
            }
            StreamEvent::Failed(error) => {
                inner.active = None;
                if let Some(message) = inner.transcript.last_mut() {
                    message.replace_content(FAILURE_NOTICE);
                }
                self.settle(
                    &mut inner,
                    SessionEvent::StreamFailed,
                    Settlement::Failed(error.to_string()),
                );
                true
            }
        }
    }

    /// Finalize the streaming message and return to idle. The caller has
    /// already cleared the active handle.
    fn settle(&self, inner: &mut Inner, event: SessionEvent, settlement: Settlement) {
        let Some(message) = inner.transcript.last_mut() else {
            return;
        };
        message.finalize();
        let message_id = message.id.clone();

        match inner.machine.handle_event(event) {
            Ok(transition) => self.publish_state(transition.to),
            Err(e) => log::warn!("{}", e),
        }

        match &settlement {
            Settlement::Failed(reason) => log::warn!("Reply {} failed: {}", message_id, reason),
            other => log::debug!("Reply {} settled: {:?}", message_id, other),
        }

        let _ = self.updates.send(SessionUpdate::Settled {
            message_id,
            settlement,
        });
    }

    /// Close-without-signal settles as completed unless already settled.
    fn settle_if_active(&self, stream_id: Uuid) {
        let mut inner = self.lock();
        if inner.active.as_ref().map(StreamHandle::id) != Some(stream_id) {
            return;
        }
        inner.active = None;
        log::debug!("[{}] Event channel closed without a terminal signal", stream_id);
        self.settle(&mut inner, SessionEvent::StreamEnded, Settlement::Completed);
    }
}

/// Apply the signals of one stream strictly in arrival order.
async fn drive_stream(
    shared: Arc<Shared>,
    stream_id: Uuid,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
) {
    while let Some(event) = events.recv().await {
        if shared.apply(stream_id, event) {
            return;
        }
    }
    shared.settle_if_active(stream_id);
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
