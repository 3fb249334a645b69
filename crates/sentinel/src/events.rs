// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast event types and the fan-out hub.
//!
//! Each `publish` enumerates the observer set once, serializes the event once,
//! and sends to every observer concurrently with an individual timeout. A
//! slow or dead observer costs at most one timeout and is pruned; it never
//! delays delivery to the rest. Delivery failures are collected and logged
//! before `publish` returns, and never surface to the publisher.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionHandle;
use crate::directive::Directive;
use crate::state::epoch_ms;

// -- Wire-format event types -------------------------------------------------

/// Envelope delivered to observers, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// A directive was created or changed state.
    DirectiveUpdate { directive: Directive },
    /// Human-readable activity line.
    Log { message: String, ts: u64 },
    /// An agent was admitted.
    Connected {
        agent_id: String,
        stake: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        capabilities: Vec<String>,
        joined_at_ms: u64,
    },
    /// An agent session ended.
    Disconnected { agent_id: String },
}

impl BroadcastEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log { message: message.into(), ts: epoch_ms() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectiveUpdate { .. } => "directive_update",
            Self::Log { .. } => "log",
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

// -- Hub ---------------------------------------------------------------------

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// The set of observer connections plus the fan-out routine.
pub struct BroadcastHub {
    observers: RwLock<HashMap<u64, ConnectionHandle>>,
    send_timeout: Duration,
}

impl BroadcastHub {
    pub fn new(send_timeout: Duration) -> Self {
        Self { observers: RwLock::new(HashMap::new()), send_timeout }
    }

    /// Add a connection to the broadcast set. Re-attaching is a no-op.
    pub fn attach(&self, handle: ConnectionHandle) {
        self.observers.write().entry(handle.id()).or_insert(handle);
    }

    /// Drop a connection from the broadcast set. Returns whether it was present.
    pub fn detach(&self, connection_id: u64) -> bool {
        self.observers.write().remove(&connection_id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_attached(&self, connection_id: u64) -> bool {
        self.observers.read().contains_key(&connection_id)
    }

    /// Deliver `event` to every observer attached at call time.
    pub async fn publish(&self, event: &BroadcastEvent) -> PublishReport {
        let text = match serde_json::to_string(event) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(kind = event.kind(), err = %e, "failed to serialize broadcast event");
                return PublishReport::default();
            }
        };

        let targets: Vec<ConnectionHandle> = self.observers.read().values().cloned().collect();
        if targets.is_empty() {
            return PublishReport::default();
        }

        let timeout = self.send_timeout;
        let results = join_all(targets.iter().map(|handle| {
            let text = text.clone();
            async move { (handle.id(), handle.send(text, timeout).await) }
        }))
        .await;

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, res) in results {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => failed.push((id, e)),
            }
        }

        // Pruning only leaves the broadcast set. The connection itself stays
        // up, so a slow agent remains routable for directives.
        if !failed.is_empty() {
            let mut observers = self.observers.write();
            for (id, err) in failed {
                if observers.remove(&id).is_some() {
                    report.pruned += 1;
                    tracing::info!(connection = id, kind = event.kind(), err = %err, "pruned observer");
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
