//! WebSocket push channel.
//!
//! Each broadcast event goes out as one text frame shaped
//! `{"event": "<name>", "data": {...}}`. Inbound frames other than ping and
//! close are ignored; clients cannot filter.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shipwatch_core::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::AppState;

/// GET /ws — upgrade to a WebSocket subscribed to the event bus.
pub async fn ws_events(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app.bus))
}

async fn handle_socket(socket: WebSocket, bus: EventBus) {
    let session_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut events = bus.subscribe();
    info!(%session_id, subscribers = bus.subscriber_count(), "dashboard client connected");

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%session_id, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%session_id, skipped, "websocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%session_id, "dashboard client disconnected");
}
