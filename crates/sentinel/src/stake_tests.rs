// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::{StakeLedger, StakePolicy};

#[yare::parameterized(
    first_agent = { 0, 10_000 },
    before_first_step = { 99, 10_000 },
    first_step = { 100, 10_500 },
    mid_first_step = { 150, 10_500 },
    second_step = { 200, 11_000 },
    tenth_step = { 1_000, 15_000 },
)]
fn default_policy_threshold(admitted: u64, expected: u64) {
    assert_eq!(StakePolicy::default().required_stake(admitted), expected);
}

#[test]
fn hundred_and_first_admission_needs_raised_stake() {
    let policy = StakePolicy::default();
    // Agents #1..#100 are admitted at counts 0..99.
    for count in 0..100 {
        assert!(policy.admit(10_000, count));
    }
    assert_eq!(policy.required_stake(100), 10_500);
    assert!(!policy.admit(10_200, 100));
    assert!(policy.admit(10_500, 100));
}

#[test]
fn zero_interval_never_grows() {
    let policy = StakePolicy { base: 500, increase_percent: 50, interval: 0 };
    assert_eq!(policy.required_stake(0), 500);
    assert_eq!(policy.required_stake(u64::MAX), 500);
}

#[test]
fn huge_counts_saturate() {
    let policy = StakePolicy { base: u64::MAX, increase_percent: 100, interval: 1 };
    assert_eq!(policy.required_stake(u64::MAX), u64::MAX);
}

#[yare::parameterized(
    max_base_one_step = { u64::MAX, 5, 1, 1 },
    max_percent = { 10_000, u64::MAX, 1, 2 },
    max_percent_max_count = { 1, u64::MAX, 1, u64::MAX },
    everything_max = { u64::MAX, u64::MAX, 1, u64::MAX },
)]
fn extreme_policies_saturate_instead_of_wrapping(base: u64, pct: u64, interval: u64, admitted: u64) {
    let policy = StakePolicy { base, increase_percent: pct, interval };
    assert_eq!(policy.required_stake(admitted), u64::MAX);
}

#[test]
fn zero_base_requires_nothing() {
    let policy = StakePolicy { base: 0, increase_percent: u64::MAX, interval: 1 };
    assert_eq!(policy.required_stake(u64::MAX), 0);
    assert!(policy.admit(0, u64::MAX));
}

#[test]
fn ledger_counter_is_monotonic() {
    let ledger = StakeLedger::new(StakePolicy { base: 100, increase_percent: 10, interval: 2 });
    assert_eq!(ledger.admitted_count(), 0);
    assert_eq!(ledger.current_requirement(), 100);

    assert_eq!(ledger.record_admission(), 1);
    assert_eq!(ledger.record_admission(), 2);
    assert_eq!(ledger.admitted_count(), 2);
    assert_eq!(ledger.current_requirement(), 110);
}

proptest! {
    #[test]
    fn threshold_is_non_decreasing(
        base in 1u64..1_000_000,
        pct in 0u64..200,
        interval in 1u64..500,
        count in 0u64..100_000,
    ) {
        let policy = StakePolicy { base, increase_percent: pct, interval };
        prop_assert!(policy.required_stake(count) <= policy.required_stake(count + 1));
    }

    #[test]
    fn threshold_never_drops_below_base(
        base in any::<u64>(),
        pct in any::<u64>(),
        interval in 1u64..4,
        count in any::<u64>(),
    ) {
        let policy = StakePolicy { base, increase_percent: pct, interval };
        prop_assert!(policy.required_stake(count) >= base);
    }

    #[test]
    fn threshold_steps_only_at_interval_multiples(
        pct in 0u64..200,
        interval in 1u64..500,
        step in 0u64..100,
    ) {
        // A base of 100 keeps integer rounding out of the picture.
        let policy = StakePolicy { base: 100, increase_percent: pct, interval };
        let at = step * interval;
        prop_assert_eq!(policy.required_stake(at), 100 + pct * step);
        prop_assert_eq!(policy.required_stake(at + interval - 1), policy.required_stake(at));
        prop_assert_eq!(policy.required_stake(at + interval) - policy.required_stake(at), pct);
    }
}
