//! The model contract.
//!
//! A model supplies an instruction source when a run starts and executes
//! instructions one at a time when the controller hands them over. All
//! results flow back through completion handles.

use serde_json::{Value, json};

use super::completion::{ExecCompletion, InitReply};
use crate::scmd::ScmdSpec;
use crate::sim::insn::InsnContext;

/// Verdict of the instruction injection hook.
#[derive(Clone, Debug, PartialEq)]
pub enum InsnCheck {
    /// Execute the instruction as fetched.
    Execute,
    /// Drop the instruction without executing it.
    Skip,
    /// Execute this instruction first, then check the original again.
    Inject(Value),
}

/// A pluggable simulation model.
///
/// Only `name` is required. The default `init` asks for the simulation's
/// default input, and the default `exec` echoes each instruction back as a
/// data payload.
pub trait Model {
    /// Human-readable model name, shown by `status`.
    fn name(&self) -> &str;

    /// Prepares an instruction source for a new run.
    ///
    /// Called while handling `run`, with that command's arguments. The
    /// model must reply through `reply`, now or later.
    fn init(&mut self, args: &[String], reply: InitReply) {
        let _ = args;
        reply.default_input();
    }

    /// Executes one instruction.
    ///
    /// Exactly one call per instruction; results go through `completion`.
    fn exec(&mut self, ictx: &InsnContext, completion: ExecCompletion) {
        completion.done_with(json!({ "addr": ictx.addr, "insn": ictx.insn }));
    }

    /// Instruction injection hook, consulted before an instruction is
    /// assigned an address.
    fn check_insn(&mut self, insn: &Value) -> InsnCheck {
        let _ = insn;
        InsnCheck::Execute
    }

    /// Commands this model contributes while it is attached.
    fn scmds(&mut self) -> Vec<ScmdSpec> {
        Vec::new()
    }
}
