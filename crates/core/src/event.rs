//! Session events: what a client sees while a reply is being produced.
//!
//! Every completed round emits exactly one of:
//! - `Start`, zero or more `Token`, `Complete` (a normal reply), or
//! - `Single` (a one-shot message, e.g. the fallback after a failure).
//!
//! Transports implement [`EventEmitter`] and map these onto their own wire
//! format; the engine never knows whether it is talking to a WebSocket or an
//! HTTP request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmitError;

/// A client-facing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new assistant reply begins
    Start,
    /// A fragment of the reply, in order
    Token(String),
    /// The reply is finished
    Complete,
    /// A standalone message outside the start/complete bracket
    Single(String),
}

impl SessionEvent {
    /// Whether this event ends the client's view of a round.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Single(_))
    }
}

/// Delivery sink for session events.
///
/// An `Err` means the client is gone; the engine stops the round and does not
/// emit anything further on this emitter.
#[async_trait]
pub trait EventEmitter: Send {
    async fn emit(&mut self, event: SessionEvent) -> Result<(), EmitError>;

    async fn emit_start(&mut self) -> Result<(), EmitError> {
        self.emit(SessionEvent::Start).await
    }

    async fn emit_token(&mut self, text: String) -> Result<(), EmitError> {
        self.emit(SessionEvent::Token(text)).await
    }

    async fn emit_complete(&mut self) -> Result<(), EmitError> {
        self.emit(SessionEvent::Complete).await
    }

    async fn emit_single(&mut self, text: String) -> Result<(), EmitError> {
        self.emit(SessionEvent::Single(text)).await
    }
}
