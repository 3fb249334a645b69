// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent session registry.
//!
//! Maps agent ids to their live connection handle. An id maps to at most one
//! handle; when an entry is dropped or replaced its handle is closed and
//! detached from the broadcast set before the write lock is released.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::connection::ConnectionHandle;
use crate::error::AdmissionError;
use crate::events::{BroadcastEvent, BroadcastHub};
use crate::stake::StakeLedger;
use crate::state::epoch_ms;

/// Whether an agent currently accepts work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
}

/// What to do when a live agent id registers again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReRegisterPolicy {
    #[default]
    Replace,
    Reject,
}

/// A live agent session.
#[derive(Debug)]
pub struct AgentSession {
    pub id: String,
    handle: ConnectionHandle,
    pub stake: u64,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub joined_at_ms: u64,
}

impl AgentSession {
    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.id.clone(),
            connection_id: self.handle.id(),
            stake: self.stake,
            status: self.status,
            capabilities: self.capabilities.clone(),
            joined_at_ms: self.joined_at_ms,
        }
    }
}

/// Point-in-time copy of a session, safe to hand to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub connection_id: u64,
    pub stake: u64,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub joined_at_ms: u64,
}

/// Registration request for one connection.
#[derive(Debug, Clone)]
pub struct Registration {
    pub agent_id: String,
    pub handle: ConnectionHandle,
    pub stake: u64,
    pub capabilities: Vec<String>,
}

/// Result of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Threshold the agent was checked against.
    pub required_stake: u64,
    /// Admissions recorded, including this one.
    pub admitted_count: u64,
    /// Whether a previous session with the same id was replaced.
    pub replaced: bool,
}

pub struct AgentRegistry {
    sessions: RwLock<IndexMap<String, AgentSession>>,
    /// Taken before the sessions lock is released, held while publishing, so
    /// membership events reach observers in commit order.
    announce: Mutex<()>,
    ledger: Arc<StakeLedger>,
    hub: Arc<BroadcastHub>,
    policy: ReRegisterPolicy,
    agents_observe: bool,
}

impl AgentRegistry {
    pub fn new(
        ledger: Arc<StakeLedger>,
        hub: Arc<BroadcastHub>,
        policy: ReRegisterPolicy,
        agents_observe: bool,
    ) -> Self {
        Self {
            sessions: RwLock::new(IndexMap::new()),
            announce: Mutex::new(()),
            ledger,
            hub,
            policy,
            agents_observe,
        }
    }

    /// Admit an agent. The stake check and the counter increment happen under
    /// the same write lock, so concurrent registrations see a consistent count.
    pub async fn register(&self, reg: Registration) -> Result<Admission, AdmissionError> {
        let Registration { agent_id, handle, stake, capabilities } = reg;

        let (admission, event, _order) = {
            let mut sessions = self.sessions.write().await;

            if self.policy == ReRegisterPolicy::Reject && sessions.contains_key(&agent_id) {
                return Err(AdmissionError::DuplicateIdentifier(agent_id));
            }

            let admitted = self.ledger.admitted_count();
            let required = self.ledger.required_stake(admitted);
            if !self.ledger.admit(stake, admitted) {
                return Err(AdmissionError::InsufficientStake { offered: stake, required });
            }
            let admitted_count = self.ledger.record_admission();

            let session = AgentSession {
                id: agent_id.clone(),
                handle: handle.clone(),
                stake,
                status: AgentStatus::Active,
                capabilities,
                joined_at_ms: epoch_ms(),
            };
            let event = BroadcastEvent::Connected {
                agent_id: agent_id.clone(),
                stake,
                capabilities: session.capabilities.clone(),
                joined_at_ms: session.joined_at_ms,
            };

            // Replacement keeps the original position in admission order.
            let previous = sessions.insert(agent_id.clone(), session);
            if let Some(ref old) = previous {
                self.retire(old);
            }
            if self.agents_observe {
                self.hub.attach(handle);
            }

            let admission =
                Admission { required_stake: required, admitted_count, replaced: previous.is_some() };
            (admission, event, self.announce.lock().await)
        };

        if admission.replaced {
            tracing::info!(agent_id = %agent_id, "agent session replaced by reconnect");
        } else {
            tracing::info!(agent_id = %agent_id, stake, "agent registered");
        }
        self.hub.publish(&event).await;
        Ok(admission)
    }

    /// Handle for routing to `agent_id`, if it is connected.
    pub async fn lookup(&self, agent_id: &str) -> Option<ConnectionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(agent_id).map(|s| s.handle.clone()).filter(|h| !h.is_closed())
    }

    /// Drop the session for `agent_id`. Removing an absent agent is a no-op.
    pub async fn remove(&self, agent_id: &str) -> bool {
        let (removed, _order) = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.shift_remove(agent_id);
            if let Some(ref session) = removed {
                self.retire(session);
            }
            (removed, self.announce.lock().await)
        };
        match removed {
            Some(_) => {
                self.announce_departure(agent_id).await;
                true
            }
            None => false,
        }
    }

    /// Drop the session for `agent_id` only if it is still bound to
    /// `connection_id`. Used on socket teardown so a replaced connection
    /// cannot evict its successor.
    pub async fn remove_connection(&self, agent_id: &str, connection_id: u64) -> bool {
        let (removed, _order) = {
            let mut sessions = self.sessions.write().await;
            let removed = match sessions.get(agent_id) {
                Some(s) if s.handle.id() == connection_id => {
                    let session = sessions.shift_remove(agent_id);
                    if let Some(ref s) = session {
                        self.retire(s);
                    }
                    session.is_some()
                }
                _ => false,
            };
            (removed, self.announce.lock().await)
        };
        if removed {
            self.announce_departure(agent_id).await;
        }
        removed
    }

    /// Drop every session. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let (drained, _order) = {
            let mut sessions = self.sessions.write().await;
            let drained: Vec<String> = sessions
                .drain(..)
                .map(|(id, session)| {
                    self.retire(&session);
                    id
                })
                .collect();
            (drained, self.announce.lock().await)
        };
        for agent_id in &drained {
            self.announce_departure(agent_id).await;
        }
        drained.len()
    }

    /// Update an agent's status. Returns false if the agent is not registered.
    pub async fn set_status(&self, agent_id: &str, status: AgentStatus) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(agent_id) {
            Some(session) => {
                session.status = status;
                tracing::info!(agent_id, status = ?status, "agent status updated");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentSnapshot> {
        self.sessions.read().await.get(agent_id).map(AgentSession::snapshot)
    }

    /// Sessions in admission order. The copy does not track later changes.
    pub async fn list(&self) -> Vec<AgentSnapshot> {
        self.sessions.read().await.values().map(AgentSession::snapshot).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close the handle and take it out of the broadcast set.
    fn retire(&self, session: &AgentSession) {
        session.handle.close();
        self.hub.detach(session.handle.id());
    }

    async fn announce_departure(&self, agent_id: &str) {
        tracing::info!(agent_id, "agent disconnected");
        self.hub.publish(&BroadcastEvent::Disconnected { agent_id: agent_id.to_owned() }).await;
    }
}

/// Generate an agent identifier.
pub fn new_agent_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("agent_{}", &id[..8])
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
