use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use sentinel_core::models::HeartbeatRequest;
use sentinel_dispatcher::HeartbeatSession;
use tracing::{debug, warn};

use crate::routes::AppState;

/// 心跳流：升级为WebSocket，每个心跳帧回复一个响应帧
pub async fn heartbeat_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session = state.coordination.open_session();
    ws.on_upgrade(move |socket| run_session(socket, session))
}

async fn run_session(mut socket: WebSocket, mut session: HeartbeatSession) {
    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(agent_id = ?session.agent_id(), error = %e, "Heartbeat stream error");
                break;
            }
        };

        let request = match frame {
            Message::Text(text) => match serde_json::from_str::<HeartbeatRequest>(text.as_str()) {
                Ok(request) => request,
                Err(e) => {
                    warn!(agent_id = ?session.agent_id(), error = %e, "Malformed heartbeat frame skipped");
                    continue;
                }
            },
            Message::Close(_) => break,
            // Pings are answered by the socket itself.
            _ => continue,
        };

        let response = match session.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(agent_id = ?session.agent_id(), error = %e, "Closing heartbeat session");
                break;
            }
        };

        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode heartbeat response");
                break;
            }
        };

        if let Err(e) = socket.send(Message::Text(payload.into())).await {
            debug!(agent_id = ?session.agent_id(), error = %e, "Heartbeat send failed");
            break;
        }
    }

    session.close().await;
}
