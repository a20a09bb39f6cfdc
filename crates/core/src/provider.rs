//! Provider trait: the abstraction over LLM backends.
//!
//! A provider turns a transcript plus tool definitions into a
//! [`GenerationHandle`]: a finite, single-consumer, cancellable sequence of
//! partial-text events followed by the assistant's final message.
//!
//! Two shapes of backend exist:
//! - token-streaming backends override [`Provider::stream`] and push chunks as
//!   they arrive;
//! - single-shot backends only implement [`Provider::complete`]; the default
//!   `stream` wraps the whole answer in one terminal chunk, so the handle
//!   yields nothing but the completion marker.
//!
//! The engine only ever talks to the handle and cannot tell the two apart.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::{Turn, TurnToolCall};
use crate::tool::ToolDefinition;

/// Capacity of the chunk channel between a provider task and its handle.
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Receiving half of a provider chunk stream.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// One generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g. "gpt-4o", "gemini-1.5-flash")
    pub model: String,

    /// Transcript snapshot, starting with the system turn
    pub turns: Vec<Turn>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The assistant turn, including any tool calls
    pub message: Turn,

    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk pushed by a provider task.
///
/// Non-terminal chunks carry text deltas that are surfaced as tokens. The
/// terminal chunk (`done == true`) carries the fully assembled tool calls and,
/// for single-shot backends, the whole message text; text on the terminal
/// chunk is part of the final message but is not surfaced as a token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<TurnToolCall>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A text delta.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// The terminal chunk.
    pub fn finish(tool_calls: Vec<TurnToolCall>, usage: Option<Usage>) -> Self {
        Self {
            content: None,
            tool_calls,
            done: true,
            usage,
        }
    }
}

/// Wrap a complete response as a stream holding only the terminal chunk.
pub fn single_chunk(response: ProviderResponse) -> ChunkReceiver {
    let (tx, rx) = mpsc::channel(1);
    // Fresh channel with one free slot.
    let _ = tx.try_send(Ok(StreamChunk {
        content: response.message.content,
        tool_calls: response.message.tool_calls,
        done: true,
        usage: response.usage,
    }));
    rx
}

/// An element of the lazy generation sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Partial assistant text, in provider order
    Token(String),
    /// Explicit end-of-sequence marker; `final_message()` is now available
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
enum HandleState {
    Streaming,
    Completed,
    Cancelled,
    Failed(String),
}

/// Ownership handle to one in-flight generation.
///
/// Consume events with [`next_event`](Self::next_event) until it returns
/// `None`, then read [`final_message`](Self::final_message). Restarting
/// requires a new `begin_generation` call.
pub struct GenerationHandle {
    chunks: ChunkReceiver,
    cancel: CancellationToken,
    content: String,
    tool_calls: Vec<TurnToolCall>,
    usage: Option<Usage>,
    tokens_yielded: usize,
    state: HandleState,
}

impl GenerationHandle {
    pub fn new(chunks: ChunkReceiver, cancel: CancellationToken) -> Self {
        Self {
            chunks,
            cancel,
            content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
            tokens_yielded: 0,
            state: HandleState::Streaming,
        }
    }

    /// Build a handle around an already complete response.
    pub fn from_response(response: ProviderResponse, cancel: CancellationToken) -> Self {
        Self::new(single_chunk(response), cancel)
    }

    /// Await the next event of the sequence.
    ///
    /// Returns `None` once the sequence is over: after `Completed`, after an
    /// error, or as soon as the handle is cancelled (pending chunks are dropped).
    pub async fn next_event(&mut self) -> Option<Result<GenerationEvent, ProviderError>> {
        loop {
            if self.state != HandleState::Streaming {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.state = HandleState::Cancelled;
                    return None;
                }
                chunk = self.chunks.recv() => chunk,
            };

            match next {
                None => {
                    let reason = "provider closed the stream before completion".to_string();
                    self.state = HandleState::Failed(reason.clone());
                    return Some(Err(ProviderError::StreamInterrupted(reason)));
                }
                Some(Err(e)) => {
                    self.state = HandleState::Failed(e.to_string());
                    return Some(Err(e));
                }
                Some(Ok(chunk)) if chunk.done => {
                    if let Some(text) = chunk.content {
                        self.content.push_str(&text);
                    }
                    self.tool_calls.extend(chunk.tool_calls);
                    if chunk.usage.is_some() {
                        self.usage = chunk.usage;
                    }
                    self.state = HandleState::Completed;
                    return Some(Ok(GenerationEvent::Completed));
                }
                Some(Ok(chunk)) => {
                    self.tool_calls.extend(chunk.tool_calls);
                    match chunk.content {
                        Some(text) if !text.is_empty() => {
                            self.content.push_str(&text);
                            self.tokens_yielded += 1;
                            return Some(Ok(GenerationEvent::Token(text)));
                        }
                        _ => continue,
                    }
                }
            }
        }
    }

    /// The assembled assistant turn.
    ///
    /// Fails with `Cancelled` if the handle was cancelled before completing and
    /// with `Incomplete` if the sequence has not been drained yet.
    pub fn final_message(&self) -> Result<Turn, ProviderError> {
        match &self.state {
            HandleState::Completed => Ok(if self.tool_calls.is_empty() {
                Turn::assistant(self.content.clone())
            } else {
                Turn::assistant_tool_calls(self.content.clone(), self.tool_calls.clone())
            }),
            HandleState::Cancelled => Err(ProviderError::Cancelled),
            HandleState::Streaming if self.cancel.is_cancelled() => Err(ProviderError::Cancelled),
            HandleState::Streaming => Err(ProviderError::Incomplete),
            HandleState::Failed(reason) => Err(ProviderError::StreamInterrupted(reason.clone())),
        }
    }

    /// Stop the generation. Idempotent; a no-op once the sequence completed.
    pub fn cancel(&self) {
        if self.state == HandleState::Streaming {
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == HandleState::Cancelled
            || (self.state == HandleState::Streaming && self.cancel.is_cancelled())
    }

    /// Number of `Token` events yielded so far.
    pub fn tokens_yielded(&self) -> usize {
        self.tokens_yielded
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait; the engine calls
/// [`begin_generation`](Provider::begin_generation) without knowing which
/// backend is configured.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "openai", "gemini").
    fn name(&self) -> &str;

    /// Whether `stream` delivers real incremental tokens.
    fn is_streaming(&self) -> bool {
        false
    }

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a receiver of chunks.
    ///
    /// Implementations must stop producing once `cancel` fires. The default
    /// implementation calls `complete()` and wraps the result as a single
    /// terminal chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkReceiver, ProviderError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.complete(request) => response?,
        };
        Ok(single_chunk(response))
    }

    /// Start a generation. `cancel` is shared with the returned handle.
    async fn begin_generation(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationHandle, ProviderError> {
        let chunks = self.stream(request, cancel.clone()).await?;
        Ok(GenerationHandle::new(chunks, cancel))
    }
}
