//! WebSocket endpoint for the realtime response bridge.

use crate::bridge::{respond, BridgeRequest};
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        Path,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

/// Handler for `GET /api/llm-websocket`.
pub async fn llm_ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, None))
}

/// Handler for `GET /api/llm-websocket/{call_id}`.
pub async fn llm_ws_call_handler(
    ws: WebSocketUpgrade,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, Some(call_id)))
}

async fn handle_socket(socket: WebSocket, call_id: Option<String>) {
    let call_id = call_id.unwrap_or_default();
    tracing::info!(%call_id, "llm websocket connected");

    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%call_id, error = %e, "llm websocket receive error");
                break;
            }
        };

        let text = match msg {
            AxumMessage::Text(text) => text,
            AxumMessage::Close(_) => break,
            _ => continue,
        };

        let request = match serde_json::from_str::<BridgeRequest>(text.as_str()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(%call_id, error = %e, "malformed bridge message, closing");
                break;
            }
        };

        let Some(reply) = respond(&request) else {
            continue;
        };

        let payload = match serde_json::to_string(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(%call_id, error = %e, "failed to encode bridge reply");
                break;
            }
        };

        if sender.send(AxumMessage::Text(payload.into())).await.is_err() {
            break;
        }
    }

    let _ = sender.close().await;
    tracing::info!(%call_id, "llm websocket disconnected");
}
