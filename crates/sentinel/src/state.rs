// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SentinelConfig;
use crate::directive::lifecycle::LifecycleTiming;
use crate::directive::{Directive, DirectiveManager, DirectiveRequest};
use crate::error::DispatchError;
use crate::events::BroadcastHub;
use crate::registry::{AgentRegistry, AgentSnapshot, ReRegisterPolicy};
use crate::stake::StakeLedger;

/// Shared coordinator state.
pub struct SentinelState {
    pub config: SentinelConfig,
    pub ledger: Arc<StakeLedger>,
    pub hub: Arc<BroadcastHub>,
    pub registry: Arc<AgentRegistry>,
    pub directives: Arc<DirectiveManager>,
    pub shutdown: CancellationToken,
}

impl SentinelState {
    pub fn new(config: SentinelConfig, shutdown: CancellationToken) -> Self {
        let ledger = Arc::new(StakeLedger::new(config.stake_policy()));
        let hub = Arc::new(BroadcastHub::new(config.send_timeout()));
        let policy = if config.reject_duplicate_ids {
            ReRegisterPolicy::Reject
        } else {
            ReRegisterPolicy::Replace
        };
        let registry = Arc::new(AgentRegistry::new(
            Arc::clone(&ledger),
            Arc::clone(&hub),
            policy,
            !config.dashboard_only_broadcast,
        ));
        let timing = LifecycleTiming {
            timeout: config.directive_timeout(),
            retention: config.directive_retention(),
            send_timeout: config.send_timeout(),
        };
        let directives =
            Arc::new(DirectiveManager::new(Arc::clone(&registry), Arc::clone(&hub), timing));
        Self { config, ledger, hub, registry, directives, shutdown }
    }

    // -- Coordinator control surface ------------------------------------------

    pub async fn create_and_dispatch(
        &self,
        req: DirectiveRequest,
    ) -> Result<Directive, DispatchError> {
        self.directives.create_and_dispatch(req).await
    }

    pub async fn list_agents(&self) -> Vec<AgentSnapshot> {
        self.registry.list().await
    }

    pub async fn list_directives(&self) -> Vec<Directive> {
        self.directives.list().await
    }

    /// Drop every agent session. Directives already in flight are left to
    /// the timeout sweep.
    pub async fn force_disconnect_all(&self) -> usize {
        let count = self.registry.clear().await;
        tracing::info!(count, "force-disconnected all agents");
        count
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
