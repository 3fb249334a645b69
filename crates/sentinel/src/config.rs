// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::stake::StakePolicy;

/// Largest accepted per-connection queue depth.
pub const MAX_OUTBOUND_BUFFER: u64 = 1 << 20;

/// Shortest sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the sentinel coordinator.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "sentinel", version, about = "Agent session and directive dispatch coordinator")]
pub struct SentinelConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SENTINEL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "SENTINEL_PORT")]
    pub port: u16,

    /// Bearer token for the HTTP API and WebSocket upgrades. If unset, auth is disabled.
    #[arg(long, env = "SENTINEL_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Stake required while fewer than one interval of agents has been admitted.
    #[arg(long, default_value_t = 10_000, env = "SENTINEL_BASE_STAKE")]
    pub base_stake: u64,

    /// Percentage of the base stake added per completed admission interval.
    #[arg(long, default_value_t = 5, env = "SENTINEL_STAKE_INCREASE_PERCENT")]
    pub stake_increase_percent: u64,

    /// Number of admissions per threshold step.
    #[arg(
        long,
        default_value_t = 100,
        env = "SENTINEL_STAKE_INCREASE_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub stake_increase_interval: u64,

    /// Seconds an in-progress directive may wait for a terminal report.
    #[arg(long, default_value_t = 60, env = "SENTINEL_DIRECTIVE_TIMEOUT_SECS")]
    pub directive_timeout_secs: u64,

    /// Timeout sweep interval in milliseconds.
    #[arg(
        long,
        default_value_t = 1000,
        env = "SENTINEL_SWEEP_INTERVAL_MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_ms: u64,

    /// Seconds a terminal directive is kept before the sweep prunes it.
    #[arg(long, default_value_t = 3600, env = "SENTINEL_DIRECTIVE_RETENTION_SECS")]
    pub directive_retention_secs: u64,

    /// Per-connection write timeout in milliseconds.
    #[arg(long, default_value_t = 2000, env = "SENTINEL_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: u64,

    /// Outbound queue depth for each connection.
    #[arg(
        long,
        default_value_t = 64,
        env = "SENTINEL_OUTBOUND_BUFFER",
        value_parser = clap::value_parser!(u64).range(1..=MAX_OUTBOUND_BUFFER)
    )]
    pub outbound_buffer: u64,

    /// Reject re-registration of a live agent id instead of replacing the session.
    #[arg(long, env = "SENTINEL_REJECT_DUPLICATE_IDS")]
    pub reject_duplicate_ids: bool,

    /// Deliver broadcast events to dashboard observers only, not to agents.
    #[arg(long, env = "SENTINEL_DASHBOARD_ONLY_BROADCAST")]
    pub dashboard_only_broadcast: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "SENTINEL_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl SentinelConfig {
    pub fn stake_policy(&self) -> StakePolicy {
        StakePolicy {
            base: self.base_stake,
            increase_percent: self.stake_increase_percent,
            interval: self.stake_increase_interval,
        }
    }

    pub fn directive_timeout(&self) -> Duration {
        Duration::from_secs(self.directive_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms).max(MIN_SWEEP_INTERVAL)
    }

    pub fn directive_retention(&self) -> Duration {
        Duration::from_secs(self.directive_retention_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn outbound_buffer(&self) -> usize {
        let depth = self.outbound_buffer.clamp(1, MAX_OUTBOUND_BUFFER);
        usize::try_from(depth).unwrap_or(1)
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            auth_token: None,
            base_stake: 10_000,
            stake_increase_percent: 5,
            stake_increase_interval: 100,
            directive_timeout_secs: 60,
            sweep_interval_ms: 1000,
            directive_retention_secs: 3600,
            send_timeout_ms: 2000,
            outbound_buffer: 64,
            reject_duplicate_ids: false,
            dashboard_only_broadcast: false,
            log_format: LogFormat::Text,
        }
    }
}
