// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the coordinator control surface.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::directive::DirectiveRequest;
use crate::error::ErrorCode;
use crate::registry::AgentStatus;
use crate::stake::StakePolicy;
use crate::state::SentinelState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_count: usize,
    pub directive_count: usize,
    pub observer_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StakeResponse {
    pub admitted_count: u64,
    pub required_stake: u64,
    #[serde(flatten)]
    pub policy: StakePolicy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveAgentResponse {
    pub id: String,
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisconnectAllResponse {
    pub disconnected: usize,
}

#[derive(Debug, Deserialize)]
pub struct AgentStatusRequest {
    pub status: AgentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentStatusResponse {
    pub id: String,
    pub status: AgentStatus,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<SentinelState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        agent_count: s.registry.len().await,
        directive_count: s.directives.len().await,
        observer_count: s.hub.observer_count(),
    })
}

/// `GET /api/v1/stake`: current admission threshold.
pub async fn stake(State(s): State<Arc<SentinelState>>) -> impl IntoResponse {
    Json(StakeResponse {
        admitted_count: s.ledger.admitted_count(),
        required_stake: s.ledger.current_requirement(),
        policy: s.ledger.policy(),
    })
}

/// `GET /api/v1/agents`
pub async fn list_agents(State(s): State<Arc<SentinelState>>) -> impl IntoResponse {
    Json(s.list_agents().await)
}

/// `DELETE /api/v1/agents`: force-disconnect every agent.
pub async fn disconnect_all(State(s): State<Arc<SentinelState>>) -> impl IntoResponse {
    Json(DisconnectAllResponse { disconnected: s.force_disconnect_all().await })
}

/// `GET /api/v1/agents/{id}`
pub async fn get_agent(State(s): State<Arc<SentinelState>>, Path(id): Path<String>) -> Response {
    match s.registry.get(&id).await {
        Some(agent) => Json(agent).into_response(),
        None => ErrorCode::AgentNotFound.to_http_response("agent not found").into_response(),
    }
}

/// `DELETE /api/v1/agents/{id}`
pub async fn remove_agent(
    State(s): State<Arc<SentinelState>>,
    Path(id): Path<String>,
) -> Response {
    if s.registry.remove(&id).await {
        Json(RemoveAgentResponse { id, removed: true }).into_response()
    } else {
        ErrorCode::AgentNotFound.to_http_response("agent not found").into_response()
    }
}

/// `PUT /api/v1/agents/{id}/status`
pub async fn set_agent_status(
    State(s): State<Arc<SentinelState>>,
    Path(id): Path<String>,
    body: Result<Json<AgentStatusRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return ErrorCode::BadRequest.to_http_response(e.body_text()).into_response(),
    };
    if s.registry.set_status(&id, req.status).await {
        Json(AgentStatusResponse { id, status: req.status }).into_response()
    } else {
        ErrorCode::AgentNotFound.to_http_response("agent not found").into_response()
    }
}

/// `POST /api/v1/directives`: create and dispatch a directive.
pub async fn create_directive(
    State(s): State<Arc<SentinelState>>,
    body: Result<Json<DirectiveRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return ErrorCode::BadRequest.to_http_response(e.body_text()).into_response(),
    };
    match s.create_and_dispatch(req).await {
        Ok(directive) => Json(directive).into_response(),
        Err(e) => e.code().to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/v1/directives`
pub async fn list_directives(State(s): State<Arc<SentinelState>>) -> impl IntoResponse {
    Json(s.list_directives().await)
}

/// `GET /api/v1/directives/{id}`
pub async fn get_directive(
    State(s): State<Arc<SentinelState>>,
    Path(id): Path<String>,
) -> Response {
    match s.directives.get(&id).await {
        Some(d) => Json(d).into_response(),
        None => ErrorCode::UnknownDirective.to_http_response("directive not found").into_response(),
    }
}
