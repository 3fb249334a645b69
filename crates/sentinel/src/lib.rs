// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sentinel: stake-gated agent sessions and directive dispatch.

pub mod config;
pub mod connection;
pub mod directive;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod stake;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::SentinelConfig;
use crate::directive::sweep::spawn_directive_sweeper;
use crate::state::SentinelState;
use crate::transport::build_router;

/// Run the coordinator until Ctrl-C.
pub async fn run(config: SentinelConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("sentinel listening on {addr}");
    let state = Arc::new(SentinelState::new(config, shutdown));
    serve(listener, state).await
}

/// Serve `state` on an already-bound listener until its shutdown token fires.
pub async fn serve(listener: TcpListener, state: Arc<SentinelState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let sweeper = spawn_directive_sweeper(
        Arc::clone(&state.directives),
        state.config.sweep_interval(),
        shutdown.clone(),
    );

    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    let dropped = state.registry.clear().await;
    tracing::info!(agents = dropped, "sentinel stopped");
    Ok(())
}
