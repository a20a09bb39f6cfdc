//! Event emitters for in-process consumers.
//!
//! [`PushEmitter`] forwards every event, in order, over a channel (the
//! push-stream transport). [`CollectingEmitter`] buffers a whole round and
//! turns it into a single reply (the request/response transport).

use async_trait::async_trait;
use staybot_core::error::EmitError;
use staybot_core::event::{EventEmitter, SessionEvent};
use tokio::sync::mpsc;

/// Ordered push delivery. A failed send means the receiver is gone, which
/// ends the round.
pub struct PushEmitter {
    tx: mpsc::Sender<SessionEvent>,
}

impl PushEmitter {
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventEmitter for PushEmitter {
    async fn emit(&mut self, event: SessionEvent) -> Result<(), EmitError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| EmitError::Disconnected("event receiver dropped".into()))
    }
}

/// Accumulates a round's events into one payload.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    events: Vec<SessionEvent>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// The reply text: a standalone message if one was emitted, otherwise the
    /// concatenated tokens.
    pub fn into_response(self) -> String {
        let single = self.events.iter().rev().find_map(|e| match e {
            SessionEvent::Single(text) => Some(text.clone()),
            _ => None,
        });
        if let Some(text) = single {
            return text;
        }
        self.events
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Token(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventEmitter for CollectingEmitter {
    async fn emit(&mut self, event: SessionEvent) -> Result<(), EmitError> {
        self.events.push(event);
        Ok(())
    }
}
