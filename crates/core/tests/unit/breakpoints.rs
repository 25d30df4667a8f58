//! # Breakpoint Table Tests
//!
//! Id allocation and the address/id index invariant, checked by example and
//! by property.

use std::collections::BTreeMap;

use ct_core::sim::{Breakpoint, BreakpointTable};
use proptest::prelude::*;

#[test]
fn test_ids_start_at_one_and_increase() {
    let mut table = BreakpointTable::new();
    assert_eq!(table.insert(10), (Breakpoint { id: 1, addr: 10 }, true));
    assert_eq!(table.insert(4), (Breakpoint { id: 2, addr: 4 }, true));
    assert_eq!(table.len(), 2);
}

#[test]
fn test_insert_existing_address_is_idempotent() {
    let mut table = BreakpointTable::new();
    let _ = table.insert(10);
    assert_eq!(table.insert(10), (Breakpoint { id: 1, addr: 10 }, false));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_ids_not_reused() {
    let mut table = BreakpointTable::new();
    let _ = table.insert(1);
    let _ = table.insert(2);
    assert_eq!(table.remove_id(2), Some(Breakpoint { id: 2, addr: 2 }));
    assert_eq!(table.clear(), 1);
    assert!(table.is_empty());
    assert_eq!(table.insert(2).0.id, 3);
}

#[test]
fn test_remove_by_address() {
    let mut table = BreakpointTable::new();
    let _ = table.insert(7);
    assert_eq!(table.remove_addr(8), None);
    assert_eq!(table.remove_addr(7), Some(Breakpoint { id: 1, addr: 7 }));
    assert!(!table.contains(7));
    assert_eq!(table.remove_id(1), None);
}

#[test]
fn test_iter_in_id_order() {
    let mut table = BreakpointTable::new();
    for addr in [30, 10, 20] {
        let _ = table.insert(addr);
    }
    let addrs: Vec<u64> = table.iter().map(|bp| bp.addr).collect();
    assert_eq!(addrs, vec![30, 10, 20]);
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u64),
    RemoveId(u32),
    RemoveAddr(u64),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..16).prop_map(Op::Insert),
        2 => (0u32..20).prop_map(Op::RemoveId),
        2 => (0u64..16).prop_map(Op::RemoveAddr),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    /// The table agrees with a simple model after any sequence of edits.
    #[test]
    fn prop_table_matches_model(ops in prop::collection::vec(op(), 0..64)) {
        let mut table = BreakpointTable::new();
        let mut model: BTreeMap<u32, u64> = BTreeMap::new();
        let mut next_id = 1u32;

        for op in ops {
            match op {
                Op::Insert(addr) => {
                    let (bp, created) = table.insert(addr);
                    let existing = model.iter().find(|(_, a)| **a == addr).map(|(id, _)| *id);
                    match existing {
                        Some(id) => {
                            prop_assert!(!created);
                            prop_assert_eq!(bp.id, id);
                        }
                        None => {
                            prop_assert!(created);
                            prop_assert_eq!(bp.id, next_id);
                            let _ = model.insert(next_id, addr);
                            next_id += 1;
                        }
                    }
                }
                Op::RemoveId(id) => {
                    let expected = model.remove(&id).map(|addr| Breakpoint { id, addr });
                    prop_assert_eq!(table.remove_id(id), expected);
                }
                Op::RemoveAddr(addr) => {
                    let id = model.iter().find(|(_, a)| **a == addr).map(|(id, _)| *id);
                    let expected = id.map(|id| {
                        let _ = model.remove(&id);
                        Breakpoint { id, addr }
                    });
                    prop_assert_eq!(table.remove_addr(addr), expected);
                }
                Op::Clear => {
                    prop_assert_eq!(table.clear(), model.len());
                    model.clear();
                }
            }

            let listed: Vec<(u32, u64)> = table.iter().map(|bp| (bp.id, bp.addr)).collect();
            let expected: Vec<(u32, u64)> = model.iter().map(|(id, addr)| (*id, *addr)).collect();
            prop_assert_eq!(listed, expected);
            for (id, addr) in &model {
                prop_assert_eq!(table.id_at(*addr), Some(*id));
            }
        }
    }
}
