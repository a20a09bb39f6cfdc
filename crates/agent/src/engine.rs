//! Orchestration Engine: drives one user input to a final reply.
//!
//! ```text
//! Idle ──input──▶ Generating ──tool calls──▶ ToolDispatch ──▶ Generating ... ──▶ Idle
//!                     │                           │
//!                     ├── stop ──▶ Cancelled      └── failure ──▶ Error
//!                     └── failure ──▶ Error
//! ```
//!
//! Every path ends back in `Idle`. What the client sees:
//! - a reply: `Start`, the tokens, `Complete`
//! - a failure: one `Single` carrying the fallback text
//! - a stop: nothing further

use staybot_config::AppConfig;
use staybot_core::error::{EmitError, ProviderError, ToolError, TranscriptError};
use staybot_core::event::EventEmitter;
use staybot_core::message::{Turn, TurnToolCall};
use staybot_core::provider::{GenerationEvent, Provider, ProviderRequest};
use staybot_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::session::{Session, SessionControl};

/// Per-request knobs of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Tool dispatches allowed per user input
    pub max_tool_rounds: u32,
    pub fallback_message: String,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model_name(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_tool_rounds: config.engine.max_tool_rounds,
            fallback_message: config.engine.fallback_message.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a user input ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A final assistant message was produced and committed
    Answered { reply: String, generations: usize },
    /// Blank input; nothing happened
    Ignored,
    /// The stop signal ended the round
    Cancelled,
    /// The round failed and the fallback message was emitted
    Failed { reason: String },
    /// The client went away mid-round
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
enum RoundError {
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(ProviderError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("tool round limit of {0} reached")]
    TooManyToolRounds(u32),

    #[error(transparent)]
    Disconnected(#[from] EmitError),
}

impl From<ProviderError> for RoundError {
    fn from(e: ProviderError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Provider(e)
        }
    }
}

/// The chat engine. Stateless between rounds; all conversation state lives in
/// the [`Session`] passed in.
pub struct ChatEngine {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: EngineSettings,
}

impl ChatEngine {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: EngineSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one user input to completion.
    pub async fn handle_input(
        &self,
        session: &mut Session,
        input: &str,
        emitter: &mut dyn EventEmitter,
    ) -> RoundOutcome {
        if input.trim().is_empty() {
            debug!(session_id = %session.id(), "Ignoring empty input");
            return RoundOutcome::Ignored;
        }

        let control = session.control();
        let _round = control.begin_round();
        let started = Instant::now();
        info!(
            session_id = %session.id(),
            turns = session.transcript.len(),
            "Processing user input"
        );

        let result = self.run_round(session, input, &control, emitter).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok((reply, generations)) => {
                info!(session_id = %session.id(), generations, duration_ms, "Round complete");
                RoundOutcome::Answered { reply, generations }
            }
            Err(RoundError::Cancelled) => {
                info!(session_id = %session.id(), duration_ms, "Round cancelled");
                RoundOutcome::Cancelled
            }
            Err(RoundError::Disconnected(e)) => {
                warn!(session_id = %session.id(), "Client went away mid-round: {e}");
                RoundOutcome::Disconnected
            }
            Err(e) => {
                error!(session_id = %session.id(), error = %e, duration_ms, "Round failed");
                if let Err(e) = emitter
                    .emit_single(self.settings.fallback_message.clone())
                    .await
                {
                    warn!(session_id = %session.id(), "Could not deliver fallback message: {e}");
                    return RoundOutcome::Disconnected;
                }
                RoundOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_round(
        &self,
        session: &mut Session,
        input: &str,
        control: &SessionControl,
        emitter: &mut dyn EventEmitter,
    ) -> Result<(String, usize), RoundError> {
        session.transcript.commit(Turn::user(input))?;
        emitter.emit_start().await?;

        let mut generations = 0;
        let mut tool_rounds = 0;
        loop {
            generations += 1;
            debug!(session_id = %session.id(), generation = generations, "Starting generation");

            let (message, streamed) = self
                .generate(session.transcript.snapshot(), control, emitter)
                .await?;

            if !message.requests_tools() {
                let reply = message.text().to_string();
                if streamed == 0 && !reply.is_empty() {
                    emitter.emit_token(reply.clone()).await?;
                }
                session.transcript.commit(message)?;
                emitter.emit_complete().await?;
                return Ok((reply, generations));
            }

            if tool_rounds >= self.settings.max_tool_rounds {
                return Err(RoundError::TooManyToolRounds(self.settings.max_tool_rounds));
            }
            tool_rounds += 1;

            let calls = message.tool_calls.clone();
            session.transcript.commit(message)?;
            for call in &calls {
                let output = self.dispatch(session.id(), call).await?;
                session
                    .transcript
                    .commit(Turn::tool_result(&call.id, &call.name, output))?;
            }
        }
    }

    /// One generation: stream tokens to the client, return the final message
    /// and how many tokens were streamed.
    ///
    /// The generation is stoppable only until this returns.
    async fn generate(
        &self,
        turns: Vec<Turn>,
        control: &SessionControl,
        emitter: &mut dyn EventEmitter,
    ) -> Result<(Turn, usize), RoundError> {
        let armed = control.arm();
        let cancel = armed.token();
        let request = ProviderRequest {
            model: self.settings.model.clone(),
            turns,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: self.tools.describe_all(),
        };

        let mut handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RoundError::Cancelled),
            handle = self.provider.begin_generation(request, cancel.clone()) => handle?,
        };

        while let Some(event) = handle.next_event().await {
            match event? {
                GenerationEvent::Token(text) => {
                    if let Err(e) = emitter.emit_token(text).await {
                        handle.cancel();
                        return Err(e.into());
                    }
                }
                GenerationEvent::Completed => {}
            }
        }

        let message = handle.final_message()?;
        if let Some(usage) = handle.usage() {
            debug!(
                provider = self.provider.name(),
                total_tokens = usage.total_tokens,
                "Generation finished"
            );
        }
        Ok((message, handle.tokens_yielded()))
    }

    async fn dispatch(&self, session_id: &str, call: &TurnToolCall) -> Result<String, ToolError> {
        let tool = self.tools.lookup(&call.name)?;

        let raw = call.arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };
        let arguments: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool_name: call.name.clone(),
                reason: e.to_string(),
            })?;
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments {
                tool_name: call.name.clone(),
                reason: "arguments must be a JSON object".into(),
            });
        }

        let started = Instant::now();
        let result = tool.execute(arguments).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(output) => info!(session_id, tool = %call.name, duration_ms, %output, "Tool executed"),
            Err(e) => warn!(session_id, tool = %call.name, duration_ms, "Tool failed: {e}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{CollectingEmitter, PushEmitter};
    use crate::testing::{ScriptedProvider, Step, make_tool_call};
    use crate::transcript::TranscriptStore;
    use async_trait::async_trait;
    use staybot_core::event::SessionEvent;
    use staybot_core::message::Role;
    use staybot_core::tool::{ParamKind, ParameterSpec, Tool, ToolDefinition};
    use staybot_tools::CalculatePriceTool;
    use tokio::sync::mpsc;

    const FALLBACK: &str = "An error occurred. Please try again.";

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "bookRoom".into(),
                description: "always fails".into(),
                parameters: vec![ParameterSpec::required("roomId", ParamKind::Number, "room")],
            }
        }

        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "bookRoom".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CalculatePriceTool));
        tools.register(Arc::new(FailingTool));
        Arc::new(tools)
    }

    fn engine(provider: Arc<ScriptedProvider>) -> ChatEngine {
        engine_with_rounds(provider, 5)
    }

    fn engine_with_rounds(provider: Arc<ScriptedProvider>, max_tool_rounds: u32) -> ChatEngine {
        ChatEngine::new(
            provider,
            registry(),
            EngineSettings {
                model: "scripted-model".into(),
                temperature: 0.7,
                max_tokens: None,
                max_tool_rounds,
                fallback_message: FALLBACK.into(),
            },
        )
    }

    fn session() -> Session {
        Session::new(TranscriptStore::new(
            r#"Rooms: [{"id":1,"name":"Deluxe","pricePerNight":150}]"#,
        ))
    }

    fn price_call(id: &str) -> TurnToolCall {
        make_tool_call(
            id,
            "calculatePrice",
            serde_json::json!({"pricePerNight": 150, "duration": 3}),
        )
    }

    #[tokio::test]
    async fn plain_reply_appends_two_turns_and_one_cycle() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::text(&["Hello", "! How", " can I help?"])]));
        let engine = engine(provider.clone());
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "Hi", &mut emitter).await;

        assert_eq!(
            outcome,
            RoundOutcome::Answered {
                reply: "Hello! How can I help?".into(),
                generations: 1
            }
        );
        assert_eq!(session.transcript.len(), 3);
        let roles: Vec<Role> = session.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        let events = emitter.events();
        assert_eq!(events.first(), Some(&SessionEvent::Start));
        assert_eq!(events.last(), Some(&SessionEvent::Complete));
        assert_eq!(events.iter().filter(|e| **e == SessionEvent::Start).count(), 1);
        assert_eq!(emitter.into_response(), "Hello! How can I help?");
    }

    #[tokio::test]
    async fn tokens_concatenate_to_the_final_message() {
        let parts = ["The ", "Deluxe ", "room ", "is ", "150 ", "per night."];
        let provider = Arc::new(ScriptedProvider::new(vec![Step::text(&parts)]));
        let engine = engine(provider);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        engine.handle_input(&mut session, "Rooms?", &mut emitter).await;

        let streamed: String = emitter
            .events()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, session.transcript.last().unwrap().text());
        assert_eq!(streamed, parts.concat());
    }

    #[tokio::test]
    async fn single_shot_reply_is_emitted_as_one_token() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::single_text("Welcome!")]));
        let engine = engine(provider);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        engine.handle_input(&mut session, "Hi", &mut emitter).await;

        assert_eq!(
            emitter.events(),
            &[
                SessionEvent::Start,
                SessionEvent::Token("Welcome!".into()),
                SessionEvent::Complete
            ]
        );
    }

    #[tokio::test]
    async fn one_tool_call_appends_four_turns_and_two_generations() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::tools(vec![price_call("call_1")]),
            Step::text(&["The total for 3 nights is 450."]),
        ]));
        let engine = engine(provider.clone());
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine
            .handle_input(&mut session, "I'd like the Deluxe room for 3 nights", &mut emitter)
            .await;

        assert_eq!(
            outcome,
            RoundOutcome::Answered {
                reply: "The total for 3 nights is 450.".into(),
                generations: 2
            }
        );
        assert_eq!(provider.call_count(), 2);

        let turns = session.transcript.turns();
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[1].role, Role::User);
        assert!(turns[2].requests_tools());
        assert_eq!(turns[3].role, Role::Tool);
        assert_eq!(turns[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(turns[3].text(), "Total price: 450");
        assert_eq!(turns[4].role, Role::Assistant);

        // The follow-up generation sees the tool result.
        let second = &provider.requests()[1];
        assert_eq!(second.turns.len(), 4);
        assert_eq!(second.turns[3].text(), "Total price: 450");
        assert_eq!(second.tools.len(), 2);
    }

    #[tokio::test]
    async fn tool_calls_run_in_emission_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::single_tools(vec![
                make_tool_call("a", "calculatePrice", serde_json::json!({"pricePerNight": 100, "duration": 2})),
                make_tool_call("b", "calculatePrice", serde_json::json!({"pricePerNight": 80, "duration": 1})),
            ]),
            Step::single_text("Two options: 200 or 80."),
        ]));
        let engine = engine(provider);
        let mut session = session();

        engine
            .handle_input(&mut session, "Compare", &mut CollectingEmitter::new())
            .await;

        let results: Vec<(&str, &str)> = session
            .transcript
            .turns()
            .iter()
            .filter(|t| t.role == Role::Tool)
            .map(|t| (t.tool_call_id.as_deref().unwrap(), t.text()))
            .collect();
        assert_eq!(
            results,
            vec![("a", "Total price: 200"), ("b", "Total price: 80")]
        );
    }

    #[tokio::test]
    async fn failing_tool_emits_fallback_and_no_result_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::tools(vec![make_tool_call(
            "call_9",
            "bookRoom",
            serde_json::json!({"roomId": 1}),
        )])]));
        let engine = engine(provider.clone());
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "Book it", &mut emitter).await;

        assert!(matches!(outcome, RoundOutcome::Failed { reason } if reason.contains("connection refused")));
        assert_eq!(emitter.events().last(), Some(&SessionEvent::Single(FALLBACK.into())));
        assert!(!emitter.events().contains(&SessionEvent::Complete));
        assert!(session.transcript.turns().iter().all(|t| t.role != Role::Tool));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_arguments_fail_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::tools(vec![TurnToolCall::new(
            "call_1",
            "calculatePrice",
            "{pricePerNight: 150",
        )])]));
        let engine = engine(provider);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "Price?", &mut emitter).await;

        assert!(matches!(outcome, RoundOutcome::Failed { .. }));
        assert_eq!(emitter.into_response(), FALLBACK);
        assert!(session.transcript.turns().iter().all(|t| t.role != Role::Tool));
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::tools(vec![TurnToolCall::new(
            "call_1",
            "calculatePrice",
            "[150, 3]",
        )])]));
        let engine = engine(provider);
        let mut session = session();

        let outcome = engine
            .handle_input(&mut session, "Price?", &mut CollectingEmitter::new())
            .await;
        assert!(matches!(outcome, RoundOutcome::Failed { reason } if reason.contains("JSON object")));
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::tools(vec![make_tool_call(
            "call_1",
            "cancelBooking",
            serde_json::json!({}),
        )])]));
        let engine = engine(provider);
        let mut session = session();

        let outcome = engine
            .handle_input(&mut session, "Cancel it", &mut CollectingEmitter::new())
            .await;
        assert!(matches!(outcome, RoundOutcome::Failed { reason } if reason.contains("cancelBooking")));
    }

    #[tokio::test]
    async fn provider_error_emits_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(
            ProviderError::RateLimited { retry_after_secs: 5 },
        )]));
        let engine = engine(provider);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "Hi", &mut emitter).await;

        assert!(matches!(outcome, RoundOutcome::Failed { .. }));
        assert_eq!(
            emitter.events(),
            &[SessionEvent::Start, SessionEvent::Single(FALLBACK.into())]
        );
        // Only the user turn was committed.
        assert_eq!(session.transcript.len(), 2);
    }

    #[tokio::test]
    async fn mid_stream_failure_commits_no_partial_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::FailMidStream {
            tokens: vec!["Half an ".into()],
            error: ProviderError::StreamInterrupted("connection reset".into()),
        }]));
        let engine = engine(provider);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        engine.handle_input(&mut session, "Hi", &mut emitter).await;

        assert_eq!(session.transcript.last().unwrap().role, Role::User);
        assert_eq!(emitter.events().last(), Some(&SessionEvent::Single(FALLBACK.into())));
    }

    #[tokio::test]
    async fn tool_rounds_are_capped() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::tools(vec![price_call("r1")]),
            Step::tools(vec![price_call("r2")]),
            Step::tools(vec![price_call("r3")]),
        ]));
        let engine = engine_with_rounds(provider.clone(), 2);
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "Loop", &mut emitter).await;

        assert!(matches!(outcome, RoundOutcome::Failed { reason } if reason.contains("limit of 2")));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(emitter.into_response(), FALLBACK);
    }

    #[tokio::test]
    async fn chained_tool_rounds_within_the_cap_succeed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::tools(vec![price_call("r1")]),
            Step::tools(vec![price_call("r2")]),
            Step::text(&["Done."]),
        ]));
        let engine = engine_with_rounds(provider, 2);
        let mut session = session();

        let outcome = engine
            .handle_input(&mut session, "Twice", &mut CollectingEmitter::new())
            .await;
        assert_eq!(
            outcome,
            RoundOutcome::Answered {
                reply: "Done.".into(),
                generations: 3
            }
        );
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let engine = engine(provider.clone());
        let mut session = session();
        let mut emitter = CollectingEmitter::new();

        let outcome = engine.handle_input(&mut session, "   \n", &mut emitter).await;

        assert_eq!(outcome, RoundOutcome::Ignored);
        assert!(emitter.events().is_empty());
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn stop_during_generation_leaves_no_assistant_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::stall(&["Let me ", "think"]),
            Step::text(&["Sure."]),
        ]));
        let engine = Arc::new(engine(provider));
        let mut session = session();
        let control = session.control();
        let (tx, mut rx) = mpsc::channel(16);

        let round = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut emitter = PushEmitter::new(tx);
                let outcome = engine.handle_input(&mut session, "Hi", &mut emitter).await;
                (outcome, session)
            })
        };

        assert_eq!(rx.recv().await, Some(SessionEvent::Start));
        assert_eq!(rx.recv().await, Some(SessionEvent::Token("Let me ".into())));
        assert!(control.is_generating());
        assert!(control.stop());
        assert!(!control.stop());

        let (outcome, mut session) = round.await.unwrap();
        assert_eq!(outcome, RoundOutcome::Cancelled);
        assert!(!control.is_generating());

        // Nothing after the tokens: no Complete, no Single.
        let mut rest = Vec::new();
        while let Some(event) = rx.recv().await {
            rest.push(event);
        }
        assert!(rest.iter().all(|e| !e.is_terminal()));

        let roles: Vec<Role> = session.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);

        // The session is usable again.
        let outcome = engine
            .handle_input(&mut session, "Still there?", &mut CollectingEmitter::new())
            .await;
        assert!(matches!(outcome, RoundOutcome::Answered { .. }));
        assert_eq!(session.transcript.len(), 4);
    }

    /// Books after a delay, signalling once it has started.
    struct SlowBookingTool {
        started: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl Tool for SlowBookingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "bookRoom".into(),
                description: "books slowly".into(),
                parameters: vec![ParameterSpec::required("roomId", ParamKind::Number, "room")],
            }
        }

        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            self.started.notify_one();
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok("Booking id: 93f1".into())
        }
    }

    #[tokio::test]
    async fn stop_during_tool_dispatch_does_not_drop_the_follow_up() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::tools(vec![make_tool_call("call_book", "bookRoom", serde_json::json!({"roomId": 1}))]),
            Step::text(&["Your booking id is 93f1."]),
        ]));
        let started = Arc::new(tokio::sync::Notify::new());
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(SlowBookingTool {
            started: started.clone(),
        }));
        let engine = Arc::new(ChatEngine::new(
            provider.clone(),
            Arc::new(tools),
            EngineSettings::default(),
        ));
        let mut session = session();
        let control = session.control();

        let round = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut emitter = CollectingEmitter::new();
                let outcome = engine.handle_input(&mut session, "Book it", &mut emitter).await;
                (outcome, emitter, session)
            })
        };

        started.notified().await;
        assert!(control.is_busy());
        assert!(!control.is_generating());
        assert!(!control.stop());
        assert!(!control.is_stopping());

        let (outcome, emitter, session) = round.await.unwrap();
        assert_eq!(
            outcome,
            RoundOutcome::Answered {
                reply: "Your booking id is 93f1.".into(),
                generations: 2
            }
        );
        assert_eq!(provider.call_count(), 2);
        assert_eq!(emitter.events().last(), Some(&SessionEvent::Complete));
        let roles: Vec<Role> = session.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(!control.is_busy());
    }

    #[tokio::test]
    async fn dropped_client_ends_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::text(&["a", "b"])]));
        let engine = engine(provider);
        let mut session = session();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let outcome = engine
            .handle_input(&mut session, "Hi", &mut PushEmitter::new(tx))
            .await;
        assert_eq!(outcome, RoundOutcome::Disconnected);
        assert_eq!(session.transcript.last().unwrap().role, Role::User);
    }
}
