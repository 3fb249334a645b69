// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection message routing for agent sockets.
//!
//! Transport-agnostic: the socket loop hands every text frame to
//! [`handle_text`] and writes back whatever reply it returns. A bad frame
//! gets an error reply and never ends the session.

use crate::connection::ConnectionHandle;
use crate::directive::ReportedStatus;
use crate::error::{ErrorCode, TransitionError};
use crate::protocol::{AgentMessage, RegisterMetadata, Reply, StatusReply};
use crate::registry::{new_agent_id, AgentStatus, Registration};
use crate::state::SentinelState;

/// Dispatcher-side view of one agent connection.
#[derive(Debug)]
pub struct AgentSocket {
    /// Id fixed by the socket path, if any.
    path_id: Option<String>,
    /// Set once the connection has been admitted.
    agent_id: Option<String>,
    handle: ConnectionHandle,
}

impl AgentSocket {
    pub fn new(path_id: Option<String>, handle: ConnectionHandle) -> Self {
        Self { path_id, agent_id: None, handle }
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }
}

/// Route one inbound text frame. Returns the reply to write, if any.
pub async fn handle_text(state: &SentinelState, socket: &mut AgentSocket, text: &str) -> Option<Reply> {
    let msg = match AgentMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(connection = socket.handle.id(), err = %e, "rejected agent frame");
            return Some(StatusReply::from(e).into());
        }
    };

    match msg {
        AgentMessage::Register { metadata } => Some(register(state, socket, metadata).await.into()),
        AgentMessage::DirectiveResponse { directive_id, status } => {
            directive_response(state, socket, &directive_id, status).await.map(Reply::from)
        }
        AgentMessage::UpdateStatus { status } => Some(update_status(state, socket, status).await.into()),
        AgentMessage::Ping {} | AgentMessage::Heartbeat {} => Some(Reply::pong()),
    }
}

async fn register(
    state: &SentinelState,
    socket: &mut AgentSocket,
    metadata: RegisterMetadata,
) -> StatusReply {
    if let Some(ref id) = socket.agent_id {
        return StatusReply::error(
            ErrorCode::BadRequest,
            format!("connection is already registered as '{id}'"),
        );
    }
    let Some(stake) = metadata.stake else {
        return StatusReply::error(ErrorCode::ValidationError, "missing required field: stake");
    };

    let agent_id = socket
        .path_id
        .clone()
        .or_else(|| metadata.agent_id.filter(|id| !id.trim().is_empty()))
        .unwrap_or_else(new_agent_id);

    let reg = Registration {
        agent_id: agent_id.clone(),
        handle: socket.handle.clone(),
        stake,
        capabilities: metadata.capabilities,
    };
    match state.registry.register(reg).await {
        Ok(admission) => {
            socket.agent_id = Some(agent_id.clone());
            StatusReply::success("Registered successfully")
                .with_agent(agent_id, admission.required_stake)
        }
        Err(e) => {
            tracing::warn!(agent_id = %agent_id, stake, err = %e, "admission rejected");
            StatusReply::error(e.code(), e.to_string())
        }
    }
}

async fn directive_response(
    state: &SentinelState,
    socket: &AgentSocket,
    directive_id: &str,
    status: ReportedStatus,
) -> Option<StatusReply> {
    let Some(ref agent_id) = socket.agent_id else {
        return Some(StatusReply::error(
            ErrorCode::NotRegistered,
            "register before reporting directive status",
        ));
    };

    match state.directives.report(agent_id, directive_id, status).await {
        Ok(_) => None,
        Err(e @ TransitionError::StaleTransition { .. }) => {
            tracing::debug!(agent_id = %agent_id, directive_id, err = %e, "discarded stale report");
            None
        }
        Err(e) => {
            tracing::warn!(agent_id = %agent_id, directive_id, err = %e, "rejected directive report");
            Some(StatusReply::error(e.code(), e.to_string()))
        }
    }
}

async fn update_status(state: &SentinelState, socket: &AgentSocket, status: AgentStatus) -> StatusReply {
    let Some(ref agent_id) = socket.agent_id else {
        return StatusReply::error(ErrorCode::NotRegistered, "register before updating status");
    };
    if state.registry.set_status(agent_id, status).await {
        StatusReply::success("Status updated")
    } else {
        StatusReply::error(ErrorCode::NotRegistered, format!("agent '{agent_id}' is no longer registered"))
    }
}

/// Tear down the session for a closed socket. Only removes the registry
/// entry if it still belongs to this connection.
pub async fn end_session(state: &SentinelState, socket: &AgentSocket) {
    socket.handle.close();
    if let Some(ref agent_id) = socket.agent_id {
        state.registry.remove_connection(agent_id, socket.handle.id()).await;
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
