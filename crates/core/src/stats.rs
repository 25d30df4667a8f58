//! Simulation statistics collection and reporting.
//!
//! This module tracks what the harness did during a session. It provides:
//! 1. **Instruction flow:** Fetched, executed, completed and failed instruction counts.
//! 2. **Suspension:** Breakpoint hits, model traps, resumes and suspends.
//! 3. **Control:** Commands dispatched and commands that failed.

use serde::Serialize;

/// Session statistics.
///
/// Counters are cumulative across runs; a fresh `run` does not reset them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    /// Instructions pulled from the instruction source.
    pub insns_fetched: u64,
    /// Instructions handed to the model's `exec`.
    pub insns_executed: u64,
    /// Instructions that completed successfully.
    pub insns_completed: u64,
    /// Instructions whose execution failed.
    pub insn_errors: u64,
    /// Traps requested by the model.
    pub model_traps: u64,
    /// Suspensions caused by a breakpoint.
    pub breakpoint_hits: u64,
    /// Data payloads produced by the model.
    pub data_payloads: u64,
    /// Transitions into the running state.
    pub resumes: u64,
    /// Transitions out of the running state.
    pub suspends: u64,
    /// Commands that reached a handler or were rejected by dispatch.
    pub scmds_dispatched: u64,
    /// Commands whose terminal response was an error.
    pub scmds_failed: u64,
}

impl SimStats {
    /// Renders the one-line summary used by `status`.
    pub fn summary(&self) -> String {
        format!(
            "fetched={} executed={} completed={} errors={} traps={} breakpoints={} data={} resumes={} suspends={} scmds={} scmd_errors={}",
            self.insns_fetched,
            self.insns_executed,
            self.insns_completed,
            self.insn_errors,
            self.model_traps,
            self.breakpoint_hits,
            self.data_payloads,
            self.resumes,
            self.suspends,
            self.scmds_dispatched,
            self.scmds_failed,
        )
    }
}
