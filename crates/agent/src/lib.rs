//! # staybot agent
//!
//! The chat orchestration engine and the state it works on.
//!
//! - [`TranscriptStore`]: append-only turn log, mirrored to the archive
//! - [`Session`]: one conversation, plus a [`SessionControl`] to stop it
//! - [`ChatEngine`]: runs a user input through generation and tool rounds
//! - [`PushEmitter`] / [`CollectingEmitter`]: in-process event sinks
//! - [`Runtime`]: startup wiring from configuration

pub mod bootstrap;
pub mod emitter;
pub mod engine;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transcript;

pub use bootstrap::{BootstrapError, Runtime};
pub use emitter::{CollectingEmitter, PushEmitter};
pub use engine::{ChatEngine, EngineSettings, RoundOutcome};
pub use session::{Session, SessionControl};
pub use transcript::TranscriptStore;
