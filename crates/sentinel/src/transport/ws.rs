// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent WebSocket endpoint.
//!
//! Each socket is split: a writer task drains the connection's outbound
//! queue while this loop reads frames and hands them to the dispatcher.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::connection::{pump_outbound, ConnectionHandle};
use crate::dispatcher::{self, AgentSocket};
use crate::error::ErrorCode;
use crate::protocol::StatusReply;
use crate::state::SentinelState;
use crate::transport::auth;

/// Query parameters for WebSocket upgrades.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

impl WsQuery {
    pub(crate) fn authorize(&self, state: &SentinelState) -> Result<(), Response> {
        auth::validate_ws_token(self.token.as_deref(), state.config.auth_token.as_deref())
            .map_err(|code| code.to_http_response("unauthorized").into_response())
    }
}

pub(crate) fn text_frame(text: String) -> Message {
    Message::Text(text.into())
}

/// `GET /ws/agent/{agent_id}`: agent socket with a fixed id.
pub async fn agent_ws_handler(
    State(state): State<Arc<SentinelState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(resp) = query.authorize(&state) {
        return resp;
    }
    ws.on_upgrade(move |socket| handle_agent_socket(state, Some(agent_id), socket)).into_response()
}

/// `GET /ws/agent`: agent socket whose id comes from `register`.
pub async fn agent_ws_anon_handler(
    State(state): State<Arc<SentinelState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(resp) = query.authorize(&state) {
        return resp;
    }
    ws.on_upgrade(move |socket| handle_agent_socket(state, None, socket)).into_response()
}

/// Per-connection control loop. Ends on disconnect, on shutdown, or when the
/// registry closes this connection's handle.
async fn handle_agent_socket(state: Arc<SentinelState>, path_id: Option<String>, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (handle, rx) = ConnectionHandle::new(state.config.outbound_buffer());
    let writer = tokio::spawn(pump_outbound(handle.clone(), rx, ws_tx, text_frame));
    let send_timeout = state.config.send_timeout();
    let mut agent = AgentSocket::new(path_id, handle.clone());
    tracing::debug!(connection = handle.id(), "agent socket opened");

    loop {
        let reply = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = handle.closed() => break,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    dispatcher::handle_text(&state, &mut agent, text.as_str()).await
                }
                Some(Ok(Message::Binary(_))) => Some(
                    StatusReply::error(ErrorCode::BadRequest, "binary frames are not supported").into(),
                ),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(connection = handle.id(), err = %e, "agent socket read failed");
                    break;
                }
                _ => None,
            },
        };

        if let Some(reply) = reply {
            if let Err(e) = handle.send_json(&reply, send_timeout).await {
                tracing::debug!(connection = handle.id(), err = %e, "agent reply not delivered");
                break;
            }
        }
    }

    dispatcher::end_session(&state, &agent).await;
    let _ = writer.await;
    tracing::debug!(connection = handle.id(), agent_id = ?agent.agent_id(), "agent socket closed");
}
