//! Execution engine.
//!
//! The engine owns the instruction source of one run. It pulls instructions
//! in order, lets the model filter or inject instructions, and assigns each
//! one the next address. Execution itself is coordinated by the controller.

use serde_json::Value;
use tracing::trace;

use super::insn::InsnContext;
use super::source::InstructionSource;
use crate::common::CtError;
use crate::model::{InsnCheck, Model};

/// Fetch side of one run.
#[derive(Debug)]
pub struct Engine {
    source: Box<dyn InstructionSource>,
    /// `None` once the instruction at `u64::MAX` has been handed out.
    next_addr: Option<u64>,
    /// Original instruction held back while an injected one runs first.
    held: Option<Value>,
    /// A fetch task is queued and has not run yet.
    pub(crate) fetch_outstanding: bool,
    exhausted: bool,
}

impl Engine {
    /// Creates an engine reading `source`, numbering from `start_addr`.
    pub fn new(source: Box<dyn InstructionSource>, start_addr: u64) -> Self {
        Self {
            source,
            next_addr: Some(start_addr),
            held: None,
            fetch_outstanding: false,
            exhausted: false,
        }
    }

    /// Address the next fetched instruction will receive, or `None` if the
    /// address space is used up.
    pub const fn next_addr(&self) -> Option<u64> {
        self.next_addr
    }

    /// Returns true once the source reported end of input or an error.
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pulls the next instruction to execute.
    ///
    /// The model's `check_insn` hook runs on every instruction: skipped
    /// instructions are dropped without an address, injected instructions
    /// run before the original, which is then checked again.
    ///
    /// # Returns
    ///
    /// `Ok(None)` at end of input, `CtError::Source` if an instruction is
    /// left over after address `u64::MAX`. Once this returns `Ok(None)` or
    /// an error the engine is exhausted.
    pub fn fetch(&mut self, model: &mut dyn Model) -> Result<Option<InsnContext>, CtError> {
        loop {
            let insn = match self.held.take() {
                Some(insn) => insn,
                None => match self.source.next_insn() {
                    Ok(Some(insn)) => insn,
                    Ok(None) => {
                        self.exhausted = true;
                        return Ok(None);
                    }
                    Err(e) => {
                        self.exhausted = true;
                        return Err(e);
                    }
                },
            };

            match model.check_insn(&insn) {
                InsnCheck::Execute => return self.assign(insn).map(Some),
                InsnCheck::Skip => {
                    trace!(next_addr = self.next_addr, "model skipped instruction");
                }
                InsnCheck::Inject(extra) => {
                    trace!(next_addr = self.next_addr, "model injected instruction");
                    self.held = Some(insn);
                    return self.assign(extra).map(Some);
                }
            }
        }
    }

    fn assign(&mut self, insn: Value) -> Result<InsnContext, CtError> {
        let Some(addr) = self.next_addr else {
            self.exhausted = true;
            self.held = None;
            return Err(CtError::Source(
                "instruction past the end of the address space".into(),
            ));
        };
        self.next_addr = addr.checked_add(1);
        Ok(InsnContext::new(addr, insn))
    }
}
