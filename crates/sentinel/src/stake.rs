// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stake ledger: the admission threshold as a function of admissions so far.
//!
//! The threshold is driven by the number of agents *ever* admitted, so it
//! never falls when agents leave. The counter is only advanced by the
//! registry while it holds its write lock, which makes check-then-increment
//! a single critical section.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Fixed parameters of the growing-threshold formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePolicy {
    pub base: u64,
    pub increase_percent: u64,
    pub interval: u64,
}

impl Default for StakePolicy {
    fn default() -> Self {
        Self { base: 10_000, increase_percent: 5, interval: 100 }
    }
}

impl StakePolicy {
    /// `base * (1 + increase_percent/100 * floor(admitted / interval))`, in
    /// integer arithmetic (rounded down, saturating at `u64::MAX`).
    pub fn required_stake(&self, admitted: u64) -> u64 {
        let steps = admitted.checked_div(self.interval).unwrap_or(0);
        let scaled = u128::from(self.increase_percent)
            .checked_mul(u128::from(steps))
            .and_then(|growth| growth.checked_add(100))
            .and_then(|factor| factor.checked_mul(u128::from(self.base)))
            .map(|total| total / 100);
        scaled.and_then(|v| u64::try_from(v).ok()).unwrap_or(u64::MAX)
    }

    /// Whether `declared` meets the threshold after `admitted` admissions.
    pub fn admit(&self, declared: u64, admitted: u64) -> bool {
        declared >= self.required_stake(admitted)
    }
}

/// Policy plus the monotonic admissions counter.
#[derive(Debug, Default)]
pub struct StakeLedger {
    policy: StakePolicy,
    admitted: AtomicU64,
}

impl StakeLedger {
    pub fn new(policy: StakePolicy) -> Self {
        Self { policy, admitted: AtomicU64::new(0) }
    }

    pub fn policy(&self) -> StakePolicy {
        self.policy
    }

    /// Number of admissions recorded so far.
    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::Acquire)
    }

    /// Threshold a new agent must meet right now.
    pub fn current_requirement(&self) -> u64 {
        self.policy.required_stake(self.admitted_count())
    }

    pub fn required_stake(&self, admitted: u64) -> u64 {
        self.policy.required_stake(admitted)
    }

    pub fn admit(&self, declared: u64, admitted: u64) -> bool {
        self.policy.admit(declared, admitted)
    }

    /// Advance the counter. Callers must hold the registry write lock.
    pub(crate) fn record_admission(&self) -> u64 {
        self.admitted.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
#[path = "stake_tests.rs"]
mod tests;
