//! `WebSocket` handler streaming rumor events.
//!
//! Clients connect to `GET /ws/rumors` and receive every
//! [`RumorEvent`](hearsay_types::RumorEvent) as a JSON text frame. A client
//! that falls behind skips the events it missed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use hearsay_rumor::ContentMutationService;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` and begin streaming rumor events.
pub async fn ws_rumors<M>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<M>>>,
) -> impl IntoResponse
where
    M: ContentMutationService + 'static,
{
    // Subscribe before the upgrade so no event between upgrade and first
    // poll is lost.
    let rx = state.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, rx))
}

async fn handle_ws(
    mut socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<hearsay_types::RumorEvent>,
) {
    debug!("rumor stream client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(error = %e, "failed to serialize rumor event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("rumor stream client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "rumor stream client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("rumor event channel closed, closing stream");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("rumor stream client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "rumor stream socket error");
                        return;
                    }
                    // Client text and binary frames are ignored.
                    _ => {}
                }
            }
        }
    }
}
