// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweep that times out stale directives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DirectiveManager;

/// Spawn a single task that sweeps the directive table every `interval`
/// until `shutdown` fires. A zero interval is raised to one millisecond.
pub fn spawn_directive_sweeper(
    directives: Arc<DirectiveManager>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let outcome = directives.sweep(Instant::now()).await;
            if !outcome.timed_out.is_empty() {
                tracing::warn!(count = outcome.timed_out.len(), "directives timed out");
            }
        }
        tracing::debug!("directive sweeper stopped");
    })
}
