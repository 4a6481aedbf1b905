//! WebSocket endpoint
//!
//! Upgrades each client connection and hands it to a dedicated chat
//! session. Connections are independent; they share nothing but the
//! application state.

use crate::chat::ChatSession;
use crate::state::AppState;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// WebSocket upgrade handler
///
/// # Arguments
/// * `ws` - WebSocket upgrade request
/// * `state` - Shared application state
///
/// # Returns
/// * `Response` - HTTP response initiating the WebSocket connection
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// Run one session per accepted connection, tagged for tracing.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let span = info_span!("chat_session", connection_id = %connection_id);
    ChatSession::new(socket, state).run().instrument(span).await;
}
