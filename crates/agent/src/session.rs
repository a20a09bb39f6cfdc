//! Session: the conversation state for one chat.
//!
//! A session owns its transcript. The engine takes it by `&mut`, so two
//! rounds can never run on the same session at once. Stopping a generation
//! goes through [`SessionControl`], a cloneable handle that a transport can
//! hold while the engine is busy with the session itself.

use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transcript::TranscriptStore;

pub struct Session {
    id: String,
    pub transcript: TranscriptStore,
    control: SessionControl,
}

impl Session {
    pub fn new(transcript: TranscriptStore) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transcript,
            control: SessionControl::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A handle that can stop this session's generation from elsewhere.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }
}

#[derive(Default)]
struct ControlState {
    in_round: bool,
    generation: Option<CancellationToken>,
    stopped: bool,
}

/// Remote control for the active generation of one session.
///
/// A round may hold several generations with tool dispatch in between. Only
/// a generation can be stopped; while tools run there is nothing to stop.
#[derive(Clone, Default)]
pub struct SessionControl {
    state: Arc<Mutex<ControlState>>,
}

impl SessionControl {
    /// Mark a round as in flight until the returned guard is dropped.
    pub(crate) fn begin_round(&self) -> ActiveRound {
        self.update(|state| {
            state.in_round = true;
            state.stopped = false;
        });
        ActiveRound {
            control: self.clone(),
        }
    }

    /// Register a new generation and return its stop token.
    ///
    /// The generation stays stoppable until the returned guard is dropped.
    pub(crate) fn arm(&self) -> ArmedGeneration {
        let token = CancellationToken::new();
        self.update(|state| state.generation = Some(token.clone()));
        ArmedGeneration {
            control: self.clone(),
            token,
        }
    }

    /// Issue the stop signal. Returns whether a generation was running.
    ///
    /// Idempotent; a no-op when no generation is armed, including while
    /// tools are being dispatched.
    pub fn stop(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(token) = state.generation.clone().filter(|t| !t.is_cancelled()) else {
            return false;
        };
        debug!("Stop requested for active generation");
        token.cancel();
        state.stopped = true;
        true
    }

    /// Whether a round is in flight, generating or dispatching tools.
    pub fn is_busy(&self) -> bool {
        self.read(|state| state.in_round)
    }

    /// Whether a generation is currently streaming and can be stopped.
    pub fn is_generating(&self) -> bool {
        self.read(|state| state.generation.is_some())
    }

    /// Whether the round in flight has been stopped but has not finished
    /// unwinding yet.
    pub fn is_stopping(&self) -> bool {
        self.read(|state| state.in_round && state.stopped)
    }

    fn read(&self, f: impl FnOnce(&ControlState) -> bool) -> bool {
        self.state.lock().map(|state| f(&*state)).unwrap_or(false)
    }

    fn update(&self, f: impl FnOnce(&mut ControlState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

/// Marks a round as in flight for as long as it lives.
pub(crate) struct ActiveRound {
    control: SessionControl,
}

impl Drop for ActiveRound {
    fn drop(&mut self) {
        self.control.update(|state| *state = ControlState::default());
    }
}

/// Marks one generation as stoppable for as long as it lives.
pub(crate) struct ArmedGeneration {
    control: SessionControl,
    token: CancellationToken,
}

impl ArmedGeneration {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ArmedGeneration {
    fn drop(&mut self) {
        self.control.update(|state| state.generation = None);
    }
}
