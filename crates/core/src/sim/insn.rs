//! Instruction-with-context records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque model instruction plus engine-assigned metadata.
///
/// Created when fetched from the instruction source, annotated by the
/// controller when it matches a breakpoint, and consumed once the model
/// starts executing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsnContext {
    /// Sequence number assigned at fetch time.
    pub addr: u64,
    /// The instruction as produced by the source.
    pub insn: Value,
    /// Execution must suspend before this instruction runs.
    pub trap: bool,
    /// The trap was requested by a breakpoint rather than the model.
    pub breakpoint: bool,
}

impl InsnContext {
    /// Wraps a freshly fetched instruction.
    pub const fn new(addr: u64, insn: Value) -> Self {
        Self {
            addr,
            insn,
            trap: false,
            breakpoint: false,
        }
    }
}
