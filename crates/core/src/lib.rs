//! # staybot core
//!
//! Domain types, traits, and error definitions for the staybot booking
//! assistant. This crate has **no framework dependencies**: it defines the
//! vocabulary every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the chat engine is a trait here. Implementations live
//! in their respective crates:
//! - LLM backends implement [`Provider`] (`staybot-providers`)
//! - hotel tools implement [`Tool`] (`staybot-tools`)
//! - audit storage implements [`ChatArchive`] (`staybot-archive`)
//! - client transports implement [`EventEmitter`] (`staybot-agent`, `staybot-gateway`)

pub mod archive;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use archive::{ArchiveRecord, ChatArchive};
pub use error::{
    EmitError, Error, PersistenceError, ProviderError, Result, ToolError, TranscriptError,
};
pub use event::{EventEmitter, SessionEvent};
pub use message::{Role, Turn, TurnToolCall};
pub use provider::{
    ChunkReceiver, GenerationEvent, GenerationHandle, Provider, ProviderRequest, ProviderResponse,
    StreamChunk, Usage, single_chunk,
};
pub use tool::{ParamKind, ParameterSpec, Tool, ToolDefinition, ToolRegistry};
