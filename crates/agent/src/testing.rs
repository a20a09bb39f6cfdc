//! Scripted provider for tests of the engine and everything built on it.
//!
//! Each call to `begin_generation` plays the next [`Step`] of the script and
//! records the request it was given.

use async_trait::async_trait;
use staybot_core::error::ProviderError;
use staybot_core::message::{Turn, TurnToolCall};
use staybot_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage, single_chunk,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted generation.
#[derive(Debug, Clone)]
pub enum Step {
    /// Stream the given deltas, then finish with these tool calls
    Stream {
        tokens: Vec<String>,
        tool_calls: Vec<TurnToolCall>,
    },
    /// Answer in one piece, the way a request/response backend does
    Single(ProviderResponse),
    /// Fail before producing anything
    Fail(ProviderError),
    /// Fail after streaming some deltas
    FailMidStream {
        tokens: Vec<String>,
        error: ProviderError,
    },
    /// Stream the given deltas, then hang until cancelled
    Stall { tokens: Vec<String> },
}

impl Step {
    /// A streamed text reply.
    pub fn text(tokens: &[&str]) -> Self {
        Self::Stream {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            tool_calls: Vec::new(),
        }
    }

    /// A streamed reply that requests tools.
    pub fn tools(tool_calls: Vec<TurnToolCall>) -> Self {
        Self::Stream {
            tokens: Vec::new(),
            tool_calls,
        }
    }

    /// A single-shot text reply.
    pub fn single_text(text: &str) -> Self {
        Self::Single(make_text_response(text))
    }

    /// A single-shot reply that requests tools.
    pub fn single_tools(tool_calls: Vec<TurnToolCall>) -> Self {
        Self::Single(make_tool_call_response(tool_calls))
    }

    pub fn stall(tokens: &[&str]) -> Self {
        Self::Stall {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// A provider that plays back a fixed script of generations.
///
/// Panics if asked for more generations than scripted.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of generations started so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: ProviderRequest) -> Step {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.steps.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more steps (call #{})",
                requests.len()
            )
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_streaming(&self) -> bool {
        true
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_step(request) {
            Step::Stream { tokens, tool_calls } => Ok(ProviderResponse {
                message: if tool_calls.is_empty() {
                    Turn::assistant(tokens.concat())
                } else {
                    Turn::assistant_tool_calls(tokens.concat(), tool_calls)
                },
                usage: None,
                model: "scripted-model".into(),
            }),
            Step::Single(response) => Ok(response),
            Step::Fail(error) | Step::FailMidStream { error, .. } => Err(error),
            Step::Stall { .. } => std::future::pending().await,
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkReceiver, ProviderError> {
        let step = self.next_step(request);
        let (tx, rx) = mpsc::channel(64);
        match step {
            Step::Single(response) => return Ok(single_chunk(response)),
            Step::Fail(error) => return Err(error),
            Step::Stream { tokens, tool_calls } => {
                for token in tokens {
                    tx.send(Ok(StreamChunk::delta(token))).await.unwrap();
                }
                tx.send(Ok(StreamChunk::finish(tool_calls, None)))
                    .await
                    .unwrap();
            }
            Step::FailMidStream { tokens, error } => {
                for token in tokens {
                    tx.send(Ok(StreamChunk::delta(token))).await.unwrap();
                }
                tx.send(Err(error)).await.unwrap();
            }
            Step::Stall { tokens } => {
                for token in tokens {
                    tx.send(Ok(StreamChunk::delta(token))).await.unwrap();
                }
                // Keep the channel open until the generation is stopped.
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    drop(tx);
                });
            }
        }
        Ok(rx)
    }
}

/// A complete text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Turn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
    }
}

/// A complete response requesting tools.
pub fn make_tool_call_response(tool_calls: Vec<TurnToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Turn::assistant_tool_calls("", tool_calls),
        usage: None,
        model: "scripted-model".into(),
    }
}

pub fn make_tool_call(id: &str, name: &str, arguments: serde_json::Value) -> TurnToolCall {
    TurnToolCall::new(id, name, arguments.to_string())
}
