//! Per-endpoint event stream: `/api/sync/{endpoint_id}/status` (§4.8).
//!
//! Connection lifecycle: accept -> verify token -> subscribe -> loop
//! receive/broadcast -> disconnect drops the subscription. Broadcast is
//! best-effort: a send failure on the socket ends the connection rather
//! than blocking the coordinator.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared_types::EndpointId;

use crate::error::ApiError;
use crate::state::AppState;

const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct WsAuthQuery {
    token: String,
}

async fn upgrade(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if !app.tokens.is_admin_token(&query.token) {
        let claims = app.tokens.verify(&query.token).map_err(shared_types::CoordinatorError::from)?;
        if claims.endpoint_id != endpoint_id {
            return Err(shared_types::CoordinatorError::authorization(format!("token is not endpoint {endpoint_id}")).into());
        }
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app, endpoint_id)))
}

async fn handle_socket(mut socket: WebSocket, app: AppState, endpoint_id: EndpointId) {
    let mut events = app.events.subscribe(endpoint_id);

    loop {
        tokio::select! {
            incoming = tokio::time::timeout(IDLE_TIMEOUT, socket.next()) => {
                let Ok(Some(message)) = incoming else {
                    break;
                };
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(reply) = handle_client_message(&app, endpoint_id, &text).await {
                            if socket.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = serde_json::to_string(&event).unwrap_or_default();
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    GetStatus,
}

async fn handle_client_message(app: &AppState, endpoint_id: EndpointId, text: &str) -> Option<String> {
    let message: ClientMessage = serde_json::from_str(text).ok()?;
    match message {
        ClientMessage::Ping => Some(r#"{"type":"pong"}"#.to_string()),
        ClientMessage::GetStatus => {
            let endpoint = app.endpoints.get(endpoint_id).await.ok()?;
            let in_progress = app.store.find_in_progress_operation(endpoint_id).await.ok()?;
            let body = serde_json::json!({
                "type": "status",
                "sync_status": endpoint.sync_status,
                "in_progress_operation": in_progress,
            });
            Some(body.to_string())
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sync/:endpoint_id/status", get(upgrade))
}
