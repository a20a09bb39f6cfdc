//! Request/response handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use staybot_agent::{CollectingEmitter, RoundOutcome};
use staybot_config::BusyPolicy;
use staybot_core::archive::{ArchiveRecord, ChatArchive};
use tracing::{error, info};

use crate::{BUSY_NOTICE, SharedState};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// `POST /chat`: run one round on the shared session and return the reply.
///
/// Round failures still answer 200 with the fallback text as `response`.
pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    info!(message_len = payload.message.len(), "HTTP chat message received");

    let mut session = match state.http_session.clone().try_lock_owned() {
        Ok(session) => session,
        Err(_) if state.http_control.is_stopping() => state.http_session.clone().lock_owned().await,
        Err(_) => match state.runtime.config.engine.on_busy {
            BusyPolicy::Reject => return Err(api_error(StatusCode::CONFLICT, BUSY_NOTICE)),
            BusyPolicy::CancelPrevious => {
                state.http_control.stop();
                state.http_session.clone().lock_owned().await
            }
        },
    };

    let mut emitter = CollectingEmitter::new();
    let outcome = state
        .runtime
        .engine
        .handle_input(&mut session, &payload.message, &mut emitter)
        .await;
    drop(session);

    match outcome {
        RoundOutcome::Answered { .. } | RoundOutcome::Failed { .. } => Ok(Json(ChatResponse {
            response: emitter.into_response(),
        })),
        RoundOutcome::Cancelled => Err(api_error(
            StatusCode::CONFLICT,
            "the reply was stopped by a newer message",
        )),
        RoundOutcome::Ignored => Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty")),
        RoundOutcome::Disconnected => {
            error!("Collecting emitter reported a disconnect");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.runtime.engine.settings().fallback_message.clone(),
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// `GET /history?limit=N`: archived rows, oldest first.
pub async fn history_handler(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ArchiveRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    state.runtime.archive.recent(limit).await.map(Json).map_err(|e| {
        error!(error = %e, "History query failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "history is unavailable")
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub model: String,
}

/// `GET /health`
pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let engine = &state.runtime.engine;
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        provider: engine.provider_name().into(),
        model: engine.settings().model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use staybot_agent::testing::{Step, make_tool_call};
    use staybot_config::BusyPolicy;
    use staybot_core::error::ProviderError;
    use tower::ServiceExt;

    fn chat_request(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "message": message }).to_string(),
            ))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_returns_the_full_reply() {
        let (state, _) = state(vec![Step::text(&["Hello", ", welcome!"])], BusyPolicy::Reject);
        let app = build_router(state);

        let response = app.oneshot(chat_request("Hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response"], "Hello, welcome!");
    }

    #[tokio::test]
    async fn chat_runs_tools_and_keeps_the_shared_transcript() {
        let (state, provider) = state(
            vec![
                Step::tools(vec![make_tool_call(
                    "call_1",
                    "calculatePrice",
                    serde_json::json!({"pricePerNight": 150, "duration": 3}),
                )]),
                Step::single_text("The total is 450."),
                Step::single_text("You're welcome."),
            ],
            BusyPolicy::Reject,
        );
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(chat_request("Deluxe for 3 nights"))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["response"], "The total is 450.");

        let response = app.oneshot(chat_request("Thanks")).await.unwrap();
        assert_eq!(json_body(response).await["response"], "You're welcome.");

        // system, user, assistant(tools), tool, assistant, user, assistant
        assert_eq!(state.http_session.lock().await.transcript.len(), 7);
        assert_eq!(provider.requests()[2].turns.len(), 6);
    }

    #[tokio::test]
    async fn failure_answers_with_fallback_text() {
        let (state, _) = state(
            vec![Step::Fail(ProviderError::Network("reset".into()))],
            BusyPolicy::Reject,
        );
        let app = build_router(state);

        let response = app.oneshot(chat_request("Hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["response"],
            "An error occurred. Please try again."
        );
    }

    #[tokio::test]
    async fn blank_message_is_bad_request() {
        let (state, provider) = state(vec![], BusyPolicy::Reject);
        let app = build_router(state);

        let response = app.oneshot(chat_request("  ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn busy_session_is_rejected() {
        let (state, _) = state(vec![], BusyPolicy::Reject);
        let app = build_router(state.clone());

        let _held = state.http_session.clone().lock_owned().await;
        let response = app.oneshot(chat_request("Hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            json_body(response).await["error"],
            "Please wait for the current reply to finish."
        );
    }

    #[tokio::test]
    async fn cancel_previous_stops_the_running_reply() {
        let (state, _) = state(
            vec![Step::stall(&["Thinking"]), Step::text(&["Second answer"])],
            BusyPolicy::CancelPrevious,
        );
        let app = build_router(state.clone());

        let first = tokio::spawn(app.clone().oneshot(chat_request("First")));
        while !state.http_control.is_generating() {
            tokio::task::yield_now().await;
        }

        let second = app.oneshot(chat_request("Second")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(json_body(second).await["response"], "Second answer");

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn history_returns_archived_rows_oldest_first() {
        let (state, _) = state(vec![Step::text(&["Hello!"])], BusyPolicy::Reject);
        let app = build_router(state.clone());

        app.clone().oneshot(chat_request("Hi")).await.unwrap();
        state.runtime.shutdown().await;

        let req = Request::builder()
            .uri("/history?limit=10")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let rows = json_body(response).await;
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["role"], "user");
        assert_eq!(rows[0]["content"], "Hi");
        assert_eq!(rows[1]["content"], "Hello!");
        assert!(rows[1]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn health_reports_provider_and_model() {
        let (state, _) = state(vec![], BusyPolicy::Reject);
        let app = build_router(state);

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "scripted");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn ws_route_exists() {
        let (state, _) = state(vec![], BusyPolicy::Reject);
        let app = build_router(state);

        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }
}
