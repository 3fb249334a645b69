// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directive lifecycle manager.
//!
//! The table maps ids to individually locked entries. Every transition of a
//! directive (dispatch, agent report, timeout) runs while holding that
//! directive's lock and publishes its `directive_update` before releasing
//! it, so observers see each directive's updates in transition order and a
//! report racing the sweep resolves to whichever takes the lock first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use super::{new_directive_id, Directive, DirectiveRequest, DirectiveStatus, ReportedStatus};
use crate::error::{DispatchError, TransitionError};
use crate::events::{BroadcastEvent, BroadcastHub};
use crate::protocol::AgentCommand;
use crate::registry::AgentRegistry;
use crate::state::epoch_ms;

type Entry = Arc<Mutex<Directive>>;

/// Timing knobs for the lifecycle manager.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleTiming {
    /// Deadline from `in-progress` entry to a terminal report.
    pub timeout: Duration,
    /// How long terminal directives stay queryable.
    pub retention: Duration,
    /// Write timeout for delivering a directive to its agent.
    pub send_timeout: Duration,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub timed_out: Vec<String>,
    pub pruned: usize,
}

pub struct DirectiveManager {
    directives: RwLock<IndexMap<String, Entry>>,
    registry: Arc<AgentRegistry>,
    hub: Arc<BroadcastHub>,
    timing: LifecycleTiming,
}

impl DirectiveManager {
    pub fn new(registry: Arc<AgentRegistry>, hub: Arc<BroadcastHub>, timing: LifecycleTiming) -> Self {
        Self { directives: RwLock::new(IndexMap::new()), registry, hub, timing }
    }

    /// Validate, route and deliver a directive.
    ///
    /// Nothing is retained on failure: invalid requests, absent targets and
    /// failed deliveries all leave the table unchanged.
    pub async fn create_and_dispatch(
        &self,
        req: DirectiveRequest,
    ) -> Result<Directive, DispatchError> {
        // A request is `pending` from the moment it arrives. Validation runs
        // first only because a rejected request is never stored.
        let valid = req.validate().inspect_err(|e| {
            tracing::warn!(err = %e, "directive rejected");
        })?;

        let now = epoch_ms();
        let mut directive = Directive {
            id: new_directive_id(),
            agent_id: valid.agent_id,
            task: valid.task,
            payload: valid.payload,
            status: DirectiveStatus::Pending,
            created_at_ms: now,
            updated_at_ms: now,
            started: None,
            finished: None,
        };

        let Some(handle) = self.registry.lookup(&directive.agent_id).await else {
            tracing::warn!(agent_id = %directive.agent_id, task = %directive.task, "directive target unreachable");
            return Err(DispatchError::AgentUnreachable(directive.agent_id));
        };

        directive.status = DirectiveStatus::InProgress;
        directive.started = Some(Instant::now());
        let id = directive.id.clone();
        let agent_id = directive.agent_id.clone();
        let command = AgentCommand::Directive {
            directive_id: id.clone(),
            task: directive.task.clone(),
            payload: directive.payload.clone(),
        };

        // Insert locked so a fast reply waits until delivery is settled.
        let entry = Arc::new(Mutex::new(directive));
        let mut guard = Arc::clone(&entry).lock_owned().await;
        self.directives.write().await.insert(id.clone(), entry);

        if let Err(source) = handle.send_json(&command, self.timing.send_timeout).await {
            self.directives.write().await.shift_remove(&id);
            guard.status = DirectiveStatus::Pending;
            tracing::warn!(directive_id = %id, agent_id = %agent_id, err = %source, "directive delivery failed");
            return Err(DispatchError::Transport { agent_id, source });
        }

        let snapshot = (*guard).clone();
        tracing::info!(directive_id = %id, agent_id = %agent_id, task = %snapshot.task, "directive dispatched");
        self.hub.publish(&BroadcastEvent::DirectiveUpdate { directive: snapshot.clone() }).await;
        self.hub
            .publish(&BroadcastEvent::log(format!(
                "Directive {id} dispatched to agent {agent_id}: {}",
                snapshot.task
            )))
            .await;
        drop(guard);
        Ok(snapshot)
    }

    /// Apply a terminal status reported by `reporter`.
    ///
    /// Reports for unknown ids, for directives addressed to another agent, or
    /// for directives that are not `in-progress` are rejected and change nothing.
    pub async fn report(
        &self,
        reporter: &str,
        directive_id: &str,
        outcome: ReportedStatus,
    ) -> Result<Directive, TransitionError> {
        let unknown = || TransitionError::UnknownDirective(directive_id.to_owned());
        let entry = self.entry(directive_id).await.ok_or_else(unknown)?;

        let mut directive = entry.lock().await;
        if directive.agent_id != reporter {
            return Err(unknown());
        }
        match directive.status {
            DirectiveStatus::InProgress => {}
            // Only seen when delivery failed and the entry was withdrawn.
            DirectiveStatus::Pending => return Err(unknown()),
            current => {
                return Err(TransitionError::StaleTransition { id: directive_id.to_owned(), current })
            }
        }

        let next = DirectiveStatus::from(outcome);
        self.transition(&mut directive, next).await;
        Ok((*directive).clone())
    }

    /// Time out every `in-progress` directive whose deadline has passed at
    /// `now`, then prune terminal directives past retention.
    pub async fn sweep(&self, now: Instant) -> SweepOutcome {
        let entries: Vec<(String, Entry)> = {
            let table = self.directives.read().await;
            table.iter().map(|(id, e)| (id.clone(), Arc::clone(e))).collect()
        };

        let mut outcome = SweepOutcome::default();
        let mut expired = Vec::new();
        for (id, entry) in entries {
            let mut directive = entry.lock().await;
            match (directive.status, directive.started, directive.finished) {
                (DirectiveStatus::InProgress, Some(started), _)
                    if now.saturating_duration_since(started) >= self.timing.timeout =>
                {
                    self.transition(&mut directive, DirectiveStatus::TimedOut).await;
                    outcome.timed_out.push(id);
                }
                (status, _, Some(finished))
                    if status.is_terminal()
                        && now.saturating_duration_since(finished) >= self.timing.retention =>
                {
                    expired.push(id);
                }
                _ => {}
            }
        }

        if !expired.is_empty() {
            let mut table = self.directives.write().await;
            for id in &expired {
                table.shift_remove(id);
            }
            outcome.pruned = expired.len();
            tracing::debug!(count = outcome.pruned, "pruned finished directives");
        }
        outcome
    }

    pub async fn get(&self, directive_id: &str) -> Option<Directive> {
        let entry = self.entry(directive_id).await?;
        let directive = entry.lock().await;
        Some((*directive).clone())
    }

    /// Directives in creation order. Each entry is copied under its own lock.
    pub async fn list(&self) -> Vec<Directive> {
        let entries: Vec<Entry> = self.directives.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push((*entry.lock().await).clone());
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.directives.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.directives.read().await.is_empty()
    }

    async fn entry(&self, directive_id: &str) -> Option<Entry> {
        self.directives.read().await.get(directive_id).cloned()
    }

    /// Move a locked directive to a terminal state and announce it.
    async fn transition(&self, directive: &mut Directive, next: DirectiveStatus) {
        let prev = directive.status;
        directive.status = next;
        directive.updated_at_ms = epoch_ms();
        directive.finished = Some(Instant::now());

        tracing::info!(
            directive_id = %directive.id,
            agent_id = %directive.agent_id,
            prev = %prev,
            next = %next,
            "directive transition"
        );
        self.hub.publish(&BroadcastEvent::DirectiveUpdate { directive: directive.clone() }).await;
        self.hub
            .publish(&BroadcastEvent::log(format!("Directive {} {next}.", directive.id)))
            .await;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
