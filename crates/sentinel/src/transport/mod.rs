// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the coordinator.

pub mod auth;
pub mod http;
pub mod ws;
pub mod ws_observer;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SentinelState;

/// Build the axum `Router` with all coordinator routes.
pub fn build_router(state: Arc<SentinelState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/stake", get(http::stake))
        // Agents
        .route("/api/v1/agents", get(http::list_agents).delete(http::disconnect_all))
        .route("/api/v1/agents/{id}", get(http::get_agent).delete(http::remove_agent))
        .route("/api/v1/agents/{id}/status", put(http::set_agent_status))
        // Directives
        .route("/api/v1/directives", post(http::create_directive).get(http::list_directives))
        .route("/api/v1/directives/{id}", get(http::get_directive))
        // WebSocket
        .route("/ws/agent", get(ws::agent_ws_anon_handler))
        .route("/ws/agent/{agent_id}", get(ws::agent_ws_handler))
        .route("/ws/observer", get(ws_observer::observer_ws_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
