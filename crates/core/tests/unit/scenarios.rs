//! # Session Properties
//!
//! Random programs, breakpoint sets and step/continue sequences. Whatever
//! the operator does, every instruction executes exactly once, in address
//! order, and every breakpoint suspends the simulation exactly once.

use std::collections::BTreeSet;

use ct_core::{Command, RunState, SuspendReason};
use proptest::prelude::*;
use serde_json::{Value, json};

use crate::common::harness::TestContext;

fn program(len: usize) -> Vec<Value> {
    (0..len).map(|i| json!({ "op": "add", "value": i })).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_run_completes_in_order(len in 0usize..24) {
        let mut ctx = TestContext::new().with_program(program(len)).with_calc();
        let _ = ctx.ok(Command::new("run"));

        let expected: Vec<u64> = (0..len as u64).collect();
        prop_assert_eq!(ctx.done_addrs(), expected);
        prop_assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);
        prop_assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
    }

    #[test]
    fn prop_breakpoints_hit_once(
        len in 1usize..24,
        bps in prop::collection::btree_set(0u64..24, 0..6),
        steps in prop::collection::vec(any::<bool>(), 0..32),
    ) {
        let mut ctx = TestContext::new().with_program(program(len)).with_calc();
        for addr in &bps {
            let _ = ctx.ok(Command::new("bp").with_args([addr.to_string()]));
        }
        let _ = ctx.ok(Command::new("run"));

        let mut choices = steps.into_iter();
        let mut guard = 0;
        while ctx.sim.state().unwrap() == RunState::Stopped {
            guard += 1;
            prop_assert!(guard <= 2 * len + bps.len() + 2, "session did not terminate");
            let scmd = if choices.next().unwrap_or(false) { "step" } else { "cont" };
            let _ = ctx.ok(Command::new(scmd));
        }

        let expected: Vec<u64> = (0..len as u64).collect();
        prop_assert_eq!(ctx.done_addrs(), expected);

        let hit: Vec<u64> = ctx
            .suspends()
            .into_iter()
            .filter(|(reason, _)| *reason == SuspendReason::Breakpoint)
            .filter_map(|(_, addr)| addr)
            .collect();
        let reachable: Vec<u64> = bps.iter().copied().filter(|a| *a < len as u64).collect();
        prop_assert_eq!(&hit, &reachable);
        prop_assert_eq!(hit.iter().collect::<BTreeSet<_>>().len(), hit.len());
        prop_assert_eq!(ctx.suspends().last().copied(), Some((SuspendReason::Terminate, None)));
    }
}
