//! WebSocket transport: one session per connection.
//!
//! The socket is split into a reader and a writer. [`drive_connection`] only
//! sees channels of text frames and session events, so the connection logic
//! runs without a real socket in tests.

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use staybot_agent::PushEmitter;
use staybot_config::BusyPolicy;
use staybot_core::event::SessionEvent;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::protocol::{ClientEnvelope, ServerEnvelope};
use crate::{BUSY_NOTICE, SharedState};

const EVENT_BUFFER: usize = 256;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sink, mut stream) = socket.split();
    let (frame_tx, frame_rx) = mpsc::channel::<String>(16);
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let frame = ServerEnvelope::from(event).to_json();
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(WsMessage::Text(text)) => text.as_str().to_owned(),
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            if frame_tx.send(text).await.is_err() {
                break;
            }
        }
    });

    drive_connection(state, frame_rx, event_tx).await;
    reader.abort();
    let _ = writer.await;
}

/// Run one client connection until its inbound frames end.
///
/// Each `chat` frame becomes a round on the connection's session. While a
/// round is running, a new `chat` is handled per the busy policy and `stop`
/// cancels the running generation. When the client goes away, any running
/// generation is stopped.
pub async fn drive_connection(
    state: SharedState,
    mut frames: mpsc::Receiver<String>,
    events: mpsc::Sender<SessionEvent>,
) {
    let session = state.runtime.new_session();
    let session_id = session.id().to_string();
    let control = session.control();
    let session = Arc::new(Mutex::new(session));
    let mut rounds = JoinSet::new();
    info!(%session_id, "WebSocket session opened");

    while let Some(frame) = frames.recv().await {
        while rounds.try_join_next().is_some() {}

        let text = match ClientEnvelope::parse(&frame) {
            Ok(ClientEnvelope::Stop) => {
                let stopped = control.stop();
                debug!(%session_id, stopped, "Stop received");
                continue;
            }
            Ok(ClientEnvelope::Chat(text)) => text,
            Err(e) => {
                warn!(%session_id, "Ignoring client frame: {e}");
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }

        let guard = match session.clone().try_lock_owned() {
            Ok(guard) => Some(guard),
            // A stopped round is unwinding; queue behind it.
            Err(_) if control.is_stopping() => None,
            Err(_) => match state.runtime.config.engine.on_busy {
                BusyPolicy::Reject => {
                    debug!(%session_id, "Rejecting input while busy");
                    if events
                        .send(SessionEvent::Single(BUSY_NOTICE.into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
                BusyPolicy::CancelPrevious => {
                    control.stop();
                    None
                }
            },
        };

        let engine = state.runtime.engine.clone();
        let session = session.clone();
        let mut emitter = PushEmitter::new(events.clone());
        rounds.spawn(async move {
            let mut session = match guard {
                Some(guard) => guard,
                None => session.lock_owned().await,
            };
            engine.handle_input(&mut session, &text, &mut emitter).await
        });
    }

    control.stop();
    while rounds.join_next().await.is_some() {}
    info!(%session_id, "WebSocket session closed");
}
