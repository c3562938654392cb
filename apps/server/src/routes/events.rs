//! Change feed over WebSocket.
//!
//! ```text
//! GET /api/events?table=products&token=<jwt>
//!
//!   repository commit ──► ChangeFeed ──► recv_for("products") ──► Text frame
//!                                                                  {"entity":"product","table":"products",
//!                                                                   "action":"update","id":"…","at":"…"}
//! ```
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token may
//! also come as a query parameter. Without `table` every change is sent.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use stockbook_core::EntityType;
use stockbook_db::{ChangeEvent, ChangeSubscription};

use crate::auth::{authenticate, extract_bearer_token};
use crate::error::ApiError;
use crate::state::AppState;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(events))
}

#[derive(Debug, Default, Deserialize)]
struct EventParams {
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

async fn events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<EventParams>,
) -> Result<Response, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .or(params.token.as_deref())
        .ok_or_else(|| ApiError::unauthorized("Missing access token"))?;
    let user = authenticate(&state, token).await?;

    let table = match params.table.as_deref() {
        Some(name) => Some(
            EntityType::parse(name)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown table: {}", name)))?
                .table()
                .to_string(),
        ),
        None => None,
    };

    debug!(user = %user.profile.email, table = ?table, "Change stream opened");
    let subscription = state.db.subscribe();
    Ok(ws.on_upgrade(move |socket| stream_changes(socket, subscription, table)))
}

async fn next_event(
    subscription: &mut ChangeSubscription,
    table: Option<&str>,
) -> Option<ChangeEvent> {
    match table {
        Some(table) => subscription.recv_for(table).await,
        None => subscription.recv().await,
    }
}

async fn stream_changes(
    socket: WebSocket,
    mut subscription: ChangeSubscription,
    table: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping.tick().await;

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
            event = next_event(&mut subscription, table.as_deref()) => {
                let Some(event) = event else {
                    break;
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize change event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pong and client chatter are ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(table = ?table, "Change stream closed");
}
