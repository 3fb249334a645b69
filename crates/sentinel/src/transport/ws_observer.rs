// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard observer WebSocket: receives every broadcast event, sends
//! nothing but liveness probes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::connection::{pump_outbound, ConnectionHandle};
use crate::error::ErrorCode;
use crate::protocol::{AgentMessage, Reply, StatusReply};
use crate::state::SentinelState;
use crate::transport::ws::{text_frame, WsQuery};

/// `GET /ws/observer`
pub async fn observer_ws_handler(
    State(state): State<Arc<SentinelState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(resp) = query.authorize(&state) {
        return resp;
    }
    ws.on_upgrade(move |socket| handle_observer_socket(state, socket)).into_response()
}

fn observer_reply(text: &str) -> Reply {
    match AgentMessage::parse(text) {
        Ok(msg) if msg.is_probe() => Reply::pong(),
        Ok(msg) => StatusReply::error(
            ErrorCode::BadRequest,
            format!("observers cannot send '{}'", msg.action()),
        )
        .into(),
        Err(e) => StatusReply::from(e).into(),
    }
}

async fn handle_observer_socket(state: Arc<SentinelState>, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (handle, rx) = ConnectionHandle::new(state.config.outbound_buffer());
    let writer = tokio::spawn(pump_outbound(handle.clone(), rx, ws_tx, text_frame));
    let send_timeout = state.config.send_timeout();
    state.hub.attach(handle.clone());
    tracing::info!(connection = handle.id(), "observer connected");

    loop {
        let reply = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = handle.closed() => break,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => observer_reply(text.as_str()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                _ => continue,
            },
        };
        if handle.send_json(&reply, send_timeout).await.is_err() {
            break;
        }
    }

    state.hub.detach(handle.id());
    handle.close();
    let _ = writer.await;
    tracing::info!(connection = handle.id(), "observer disconnected");
}
