//! Error types for the staybot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the engine decides which of
//! them are round-fatal and which are merely logged.

use thiserror::Error;

/// The top-level error type for staybot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Persistence errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    // --- Transcript errors ---
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    // --- Client delivery errors ---
    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// `final_message()` was requested before the event sequence completed.
    #[error("Generation has not completed yet")]
    Incomplete,

    /// The generation was stopped by the user. Not a failure.
    #[error("Generation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether this error is an explicit user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// The provider requested a tool the registry does not know.
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// Name of the tool involved in the failure.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound(name) => name,
            Self::InvalidArguments { tool_name, .. } | Self::ExecutionFailed { tool_name, .. } => {
                tool_name
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// A tool result answers a call no earlier assistant turn made.
    #[error("Tool result references unknown call id: {0}")]
    UnknownToolCall(String),

    #[error("A transcript holds exactly one system turn, at the start")]
    SystemTurnNotFirst,
}

#[derive(Debug, Clone, Error)]
pub enum EmitError {
    /// The client went away; the session cannot deliver further events.
    #[error("Client disconnected: {0}")]
    Disconnected(String),
}
