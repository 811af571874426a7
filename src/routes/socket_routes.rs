//! Punto de entrada WebSocket
//!
//! Cada conexión tiene una tarea escritora que drena su cola de salida;
//! cada trama entrante se atiende en su propia tarea para que un evento
//! lento no bloquee los siguientes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dto::events::OutboundMessage;
use crate::realtime::channel_registry::Connection;
use crate::state::AppState;

pub fn create_socket_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let connection = Connection::new(tx);
    info!("🔌 Conexión WebSocket abierta: {}", connection.id);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("⚠️ No se pudo serializar '{}': {}", message.event, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let controller = Arc::clone(&state.sockets);
                let connection = connection.clone();
                tokio::spawn(async move {
                    let reply = controller.handle_text(&connection, &text).await;
                    connection.send(reply);
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                debug!("📦 Trama binaria ignorada en {}", connection.id);
            }
            Ok(_) => {}
            Err(e) => {
                debug!("🔌 Error de lectura en {}: {}", connection.id, e);
                break;
            }
        }
    }

    state.transport.leave_all(connection.id).await;
    writer.abort();
    info!("🔌 Conexión WebSocket cerrada: {}", connection.id);
}
