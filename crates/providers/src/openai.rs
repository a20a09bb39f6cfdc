//! OpenAI chat-completions provider.
//!
//! Works with OpenAI and any endpoint speaking the same
//! `/v1/chat/completions` protocol.
//!
//! Supports:
//! - Token streaming over SSE (`streaming = true`)
//! - Single-shot completions (`streaming = false`)
//! - Tool use / function calling in both modes

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use staybot_core::error::ProviderError;
use staybot_core::message::{Turn, TurnToolCall};
use staybot_core::provider::*;
use staybot_core::tool::ToolDefinition;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::http::{check_status, network};
use crate::transcript::{answered_call_ids, answered_calls};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    streaming: bool,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            streaming: true,
            client: reqwest::Client::new(),
        }
    }

    /// Talk to api.openai.com.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(DEFAULT_BASE_URL, api_key)
    }

    /// Choose between token streaming and single-shot completions.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    /// Convert turns to OpenAI API format.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        let answered = answered_call_ids(turns);

        turns
            .iter()
            .map(|t| {
                let tool_calls: Vec<ApiToolCall> = answered_calls(t, &answered)
                    .into_iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect();

                let content = match (&t.content, tool_calls.is_empty()) {
                    (Some(text), _) => Some(text.clone()),
                    (None, true) => Some(String::new()),
                    (None, false) => None,
                };

                ApiMessage {
                    role: t.role.as_str().into(),
                    content,
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: t.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.json_schema(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        event_stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body);
        if event_stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        let response = builder.send().await.map_err(network)?;
        check_status(response, "openai").await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(provider = "openai", model = %request.model, turns = request.turns.len(), "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<TurnToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| TurnToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let text = choice.message.content.unwrap_or_default();
        let message = if tool_calls.is_empty() {
            Turn::assistant(text)
        } else {
            Turn::assistant_tool_calls(text, tool_calls)
        };

        Ok(ProviderResponse {
            message,
            usage: api_response.usage.map(Usage::from),
            model: api_response.model,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkReceiver, ProviderError> {
        if !self.streaming {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                response = self.complete(request) => response?,
            };
            return Ok(single_chunk(response));
        }

        let body = Self::request_body(&request, true);
        debug!(provider = "openai", model = %request.model, turns = request.turns.len(), "Sending streaming request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.post(&body, true) => response?,
        };

        let (tx, rx) = tokio::sync::mpsc::channel(CHUNK_CHANNEL_CAPACITY);

        // Read the SSE byte stream until [DONE], EOF, or cancellation.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("OpenAI stream cancelled");
                        return;
                    }
                    next = byte_stream.next() => next,
                };

                match next {
                    Some(Ok(bytes)) => {
                        for chunk in parser.feed(&bytes) {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() || done {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    None => {
                        let _ = tx.send(parser.finish()).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Incremental parser for the chat-completions SSE stream.
///
/// Text deltas come out as they arrive; tool call deltas are accumulated per
/// index and released, in index order, with the terminal chunk.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    usage: Option<Usage>,
    /// A choice carried a `finish_reason`
    saw_finish_reason: bool,
    finished: bool,
}

impl SseParser {
    /// Feed raw bytes; returns the chunks completed by them.
    fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                out.push(self.terminal_chunk());
                break;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    if let Some(choice) = resp.choices.into_iter().next() {
                        if choice.finish_reason.is_some() {
                            self.saw_finish_reason = true;
                        }
                        for tc_delta in choice.delta.tool_calls.unwrap_or_default() {
                            let acc = self.tool_calls.entry(tc_delta.index).or_default();
                            if let Some(id) = tc_delta.id {
                                acc.id = id;
                            }
                            if let Some(func) = tc_delta.function {
                                if let Some(name) = func.name {
                                    acc.name = name;
                                }
                                if let Some(args) = func.arguments {
                                    acc.arguments.push_str(&args);
                                }
                            }
                        }

                        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                            out.push(StreamChunk::delta(content));
                        }
                    }

                    if let Some(usage) = resp.usage {
                        self.usage = Some(usage.into());
                    }
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }

        out
    }

    /// Close a stream that hit EOF without `[DONE]`.
    ///
    /// Complete only if the model already reported why it stopped; otherwise
    /// the connection was cut and the text so far is truncated.
    fn finish(mut self) -> Result<StreamChunk, ProviderError> {
        if self.finished || self.saw_finish_reason {
            Ok(self.terminal_chunk())
        } else {
            Err(ProviderError::StreamInterrupted(
                "stream ended before the model finished".into(),
            ))
        }
    }

    fn terminal_chunk(&mut self) -> StreamChunk {
        self.finished = true;
        let tool_calls = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallAccumulator::into_tool_call)
            .collect();
        StreamChunk::finish(tool_calls, self.usage)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> TurnToolCall {
        TurnToolCall::new(self.id, self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staybot_core::tool::{ParamKind, ParameterSpec};

    fn sse(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("data: {l}\n\n")).collect()
    }

    #[test]
    fn message_conversion() {
        let turns = vec![Turn::system("You are a hotel assistant"), Turn::user("Hello")];
        let api = OpenAiProvider::to_api_messages(&turns);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn message_conversion_with_tool_round() {
        let turns = vec![
            Turn::assistant_tool_calls(
                "",
                vec![TurnToolCall::new("call_1", "calculatePrice", r#"{"pricePerNight":150,"duration":3}"#)],
            ),
            Turn::tool_result("call_1", "calculatePrice", "Total price: 450"),
        ];
        let api = OpenAiProvider::to_api_messages(&turns);
        assert!(api[0].content.is_none());
        assert_eq!(api[0].tool_calls.as_ref().unwrap()[0].function.name, "calculatePrice");
        assert_eq!(api[1].role, "tool");
        assert_eq!(api[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn dangling_tool_calls_are_dropped() {
        let turns = vec![Turn::assistant_tool_calls(
            "",
            vec![TurnToolCall::new("call_1", "bookRoom", "{}")],
        )];
        let api = OpenAiProvider::to_api_messages(&turns);
        assert!(api[0].tool_calls.is_none());
        assert_eq!(api[0].content.as_deref(), Some(""));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "calculatePrice".into(),
            description: "Price a stay".into(),
            parameters: vec![ParameterSpec::required("duration", ParamKind::Number, "nights")],
        }];
        let api_tools = OpenAiProvider::to_api_tools(&tools);
        assert_eq!(api_tools[0].r#type, "function");
        assert_eq!(api_tools[0].function.parameters["properties"]["duration"]["type"], "number");
    }

    #[test]
    fn request_body_shape() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            turns: vec![Turn::user("hi")],
            temperature: 0.7,
            max_tokens: Some(256),
            tools: vec![],
        };
        let body = OpenAiProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("tools").is_none());

        let body = OpenAiProvider::request_body(&request, false);
        assert!(body.get("stream_options").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parser_emits_text_deltas_then_done() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            sse(&[
                r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#,
                r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
                r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}"#,
                "[DONE]",
            ])
            .as_bytes(),
        );

        let texts: Vec<Option<&str>> = chunks.iter().map(|c| c.content.as_deref()).collect();
        assert_eq!(texts, vec![Some("Hel"), Some("lo"), None]);
        let last = chunks.last().unwrap();
        assert!(last.done);
        assert!(last.tool_calls.is_empty());
        assert_eq!(last.usage.unwrap().total_tokens, 12);

        assert!(parser.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n").is_empty());
    }

    #[test]
    fn parser_handles_split_lines_and_multibyte_text() {
        let mut parser = SseParser::default();
        let payload = sse(&[r#"{"choices":[{"delta":{"content":"café"}}]}"#]);
        let bytes = payload.as_bytes();
        // Split inside the two-byte 'é'
        let split = payload.find('é').unwrap() + 1;

        assert!(parser.feed(&bytes[..split]).is_empty());
        let chunks = parser.feed(&bytes[split..]);
        assert_eq!(chunks[0].content.as_deref(), Some("café"));
    }

    #[test]
    fn parser_accumulates_tool_calls_in_index_order() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            sse(&[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"bookRoom","arguments":""}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"calculatePrice","arguments":"{\"pricePer"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"Night\":150,\"duration\":3}"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{}"}}]}}]}"#,
                "[DONE]",
            ])
            .as_bytes(),
        );

        assert_eq!(chunks.len(), 1);
        let calls = &chunks[0].tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].arguments, r#"{"pricePerNight":150,"duration":3}"#);
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].name, "bookRoom");
    }

    #[test]
    fn parser_ignores_comments_and_garbage() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(b": keep-alive\n\ndata: {not json}\n\nevent: ping\n");
        assert!(chunks.is_empty());
        assert!(matches!(
            parser.finish(),
            Err(ProviderError::StreamInterrupted(_))
        ));
    }

    #[test]
    fn eof_after_finish_reason_completes() {
        let mut parser = SseParser::default();
        let chunks = parser.feed(
            sse(&[
                r#"{"choices":[{"delta":{"content":"Done"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            ])
            .as_bytes(),
        );
        assert_eq!(chunks.len(), 1);
        assert!(parser.finish().unwrap().done);
    }

    // --- End-to-end against a local server ---

    async fn serve(body: String, content_type: &'static str) -> String {
        use axum::Router;
        use axum::routing::post;

        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move { ([(axum::http::header::CONTENT_TYPE, content_type)], body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o".into(),
            turns: vec![Turn::system("sys"), Turn::user("hi")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn streaming_generation_yields_tokens() {
        let url = serve(
            sse(&[
                r#"{"choices":[{"delta":{"content":"Welcome"}}]}"#,
                r#"{"choices":[{"delta":{"content":" back"}}]}"#,
                "[DONE]",
            ]),
            "text/event-stream",
        )
        .await;

        let provider = OpenAiProvider::new(url, "sk-test");
        assert!(provider.is_streaming());
        let mut handle = provider
            .begin_generation(request(), CancellationToken::new())
            .await
            .unwrap();

        let mut tokens = Vec::new();
        while let Some(event) = handle.next_event().await {
            if let GenerationEvent::Token(t) = event.unwrap() {
                tokens.push(t);
            }
        }
        assert_eq!(tokens, vec!["Welcome", " back"]);
        assert_eq!(handle.final_message().unwrap().text(), "Welcome back");
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let url = serve(
            sse(&[r#"{"choices":[{"delta":{"content":"Your booking"}}]}"#]),
            "text/event-stream",
        )
        .await;

        let provider = OpenAiProvider::new(url, "sk-test");
        let mut handle = provider
            .begin_generation(request(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            handle.next_event().await.unwrap().unwrap(),
            GenerationEvent::Token("Your booking".into())
        );
        assert!(matches!(
            handle.next_event().await,
            Some(Err(ProviderError::StreamInterrupted(_)))
        ));
        assert!(handle.final_message().is_err());
    }

    #[tokio::test]
    async fn single_shot_generation_yields_only_completion() {
        let url = serve(
            serde_json::json!({
                "model": "gpt-4o",
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "calculatePrice", "arguments": "{\"pricePerNight\":150,\"duration\":3}"}}
                ]}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 5, "total_tokens": 10}
            })
            .to_string(),
            "application/json",
        )
        .await;

        let provider = OpenAiProvider::new(url, "sk-test").with_streaming(false);
        let mut handle = provider
            .begin_generation(request(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handle.next_event().await.unwrap().unwrap(), GenerationEvent::Completed);
        assert!(handle.next_event().await.is_none());
        let turn = handle.final_message().unwrap();
        assert_eq!(turn.tool_calls[0].name, "calculatePrice");
        assert_eq!(handle.usage().unwrap().total_tokens, 10);
    }

    #[tokio::test]
    async fn cancelled_before_request_fails_fast() {
        let provider = OpenAiProvider::new("http://127.0.0.1:1/v1", "sk-test");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider.begin_generation(request(), cancel).await.err().unwrap();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn auth_failure_maps_to_error() {
        use axum::Router;
        use axum::http::StatusCode;
        use axum::routing::post;

        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = OpenAiProvider::new(format!("http://{addr}/v1"), "sk-bad");
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }
}
