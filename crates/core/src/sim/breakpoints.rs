//! Breakpoint table.
//!
//! Breakpoints are keyed by instruction address and identified by a small
//! integer id. Ids start at 1, increase monotonically and are never reused,
//! so an id printed to the operator keeps meaning the same breakpoint.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// One breakpoint as reported to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    /// Operator-visible identifier.
    pub id: u32,
    /// Instruction address the breakpoint traps on.
    pub addr: u64,
}

/// Address-to-id index plus id-ordered listing.
///
/// Invariant: `by_id` and `by_addr` always describe the same set of
/// breakpoints.
#[derive(Clone, Debug)]
pub struct BreakpointTable {
    by_id: BTreeMap<u32, u64>,
    by_addr: HashMap<u64, u32>,
    next_id: u32,
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_addr: HashMap::new(),
            next_id: 1,
        }
    }
}

impl BreakpointTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a breakpoint at `addr`.
    ///
    /// # Returns
    ///
    /// The breakpoint and whether it was newly created. Inserting at an
    /// address that already has a breakpoint returns the existing one.
    pub fn insert(&mut self, addr: u64) -> (Breakpoint, bool) {
        if let Some(&id) = self.by_addr.get(&addr) {
            return (Breakpoint { id, addr }, false);
        }
        let id = self.next_id;
        self.next_id += 1;
        let _ = self.by_id.insert(id, addr);
        let _ = self.by_addr.insert(addr, id);
        (Breakpoint { id, addr }, true)
    }

    /// Removes the breakpoint with the given id.
    pub fn remove_id(&mut self, id: u32) -> Option<Breakpoint> {
        let addr = self.by_id.remove(&id)?;
        let _ = self.by_addr.remove(&addr);
        Some(Breakpoint { id, addr })
    }

    /// Removes the breakpoint at the given address.
    pub fn remove_addr(&mut self, addr: u64) -> Option<Breakpoint> {
        let id = self.by_addr.remove(&addr)?;
        let _ = self.by_id.remove(&id);
        Some(Breakpoint { id, addr })
    }

    /// Removes every breakpoint, returning how many there were.
    ///
    /// Ids are not recycled afterwards.
    pub fn clear(&mut self) -> usize {
        let n = self.by_id.len();
        self.by_id.clear();
        self.by_addr.clear();
        n
    }

    /// Returns true if a breakpoint exists at `addr`.
    pub fn contains(&self, addr: u64) -> bool {
        self.by_addr.contains_key(&addr)
    }

    /// Id of the breakpoint at `addr`, if any.
    pub fn id_at(&self, addr: u64) -> Option<u32> {
        self.by_addr.get(&addr).copied()
    }

    /// Iterates breakpoints in id order.
    pub fn iter(&self) -> impl Iterator<Item = Breakpoint> + '_ {
        self.by_id
            .iter()
            .map(|(&id, &addr)| Breakpoint { id, addr })
    }

    /// Number of breakpoints.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if there are no breakpoints.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
