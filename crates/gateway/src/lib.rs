//! HTTP and WebSocket gateway for staybot.
//!
//! Routes:
//! - `POST /chat`      request/response chat on the shared HTTP session
//! - `GET  /ws`        push-stream chat, one session per connection
//! - `GET  /history`   most recent archived chat rows
//! - `GET  /health`    liveness plus provider/model
//!
//! Built on Axum.

pub mod http;
pub mod protocol;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use staybot_agent::{Runtime, Session, SessionControl};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Notice sent when a new input arrives while a reply is still running.
pub const BUSY_NOTICE: &str = "Please wait for the current reply to finish.";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Arc<Runtime>,
    /// The request/response transport has no connection to own a session,
    /// so all HTTP chats share this one.
    pub http_session: Arc<Mutex<Session>>,
    pub http_control: SessionControl,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(runtime: Arc<Runtime>) -> SharedState {
        let session = runtime.new_session();
        let http_control = session.control();
        Arc::new(Self {
            runtime,
            http_session: Arc::new(Mutex::new(session)),
            http_control,
        })
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = state
        .runtime
        .config
        .gateway
        .cors_origin
        .as_deref()
        .and_then(cors_layer);

    let router = Router::new()
        .route("/chat", post(http::chat_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/history", get(http::history_handler))
        .route("/health", get(http::health_handler))
        .with_state(state);

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    match origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .max_age(std::time::Duration::from_secs(3600)),
        ),
        Err(e) => {
            warn!(%origin, "Ignoring invalid CORS origin: {e}");
            None
        }
    }
}

/// Serve until `shutdown` resolves, then flush the archive.
pub async fn serve(
    runtime: Arc<Runtime>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!(
        "{}:{}",
        runtime.config.gateway.host, runtime.config.gateway.port
    );
    let app = build_router(GatewayState::new(runtime.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    runtime.shutdown().await;
    info!("Gateway stopped");
    Ok(())
}
