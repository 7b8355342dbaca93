//! WebSocket adapter for [`LiveEvalSession`].
//!
//! Frames are decoded into inbound events for the session; server messages
//! are written back by a second future joined with the session.

use std::sync::Arc;

use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use coach::engine::EngineFactory;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::live_eval::{InboundEvent, LiveEvalSession, ServerMessage, SessionEnd};
use crate::state::AppState;

/// GET /ws/live-eval
pub async fn ws_handler<F: EngineFactory>(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState<F>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn inbound_event(frame: Result<Message, axum::Error>) -> InboundEvent {
    match frame {
        Ok(Message::Text(text)) => InboundEvent::from_text(text.as_str()),
        Ok(Message::Close(_)) | Err(_) => InboundEvent::Closed,
        Ok(_) => InboundEvent::Ignored,
    }
}

async fn handle_socket<F: EngineFactory>(socket: WebSocket, state: Arc<AppState<F>>) {
    let (mut sender, receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    info!("Live eval connection opened");
    let session = LiveEvalSession::new(state.pool.clone(), state.live_eval_settings());
    let inbound = receiver.map(inbound_event);

    // The writer ends once the session drops its sender.
    let writer = async {
        while let Some(message) = out_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode live eval message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        sender
    };

    let (end, mut sender) = tokio::join!(session.run(inbound, out_tx), writer);

    if let SessionEnd::EngineFailed(reason) = &end {
        warn!("Closing live eval connection after engine failure: {reason}");
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: "Engine failure".into(),
            })))
            .await;
    }
    info!("Live eval connection closed: {end:?}");
}
