//! Accumulator calculator model.
//!
//! Instructions are `{ "op": ..., "value": <integer> }` where `op` is one of
//! `add`, `sub`, `mul`, `div`, `set` or `brk`. Each completed instruction
//! produces one data payload `{ pre, pc, insn, post, nextpc }`.
//!
//! `brk` asks the simulation to trap the first time it is executed at an
//! address and is a no-op when execution resumes on it.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use super::completion::{ExecCompletion, InitReply};
use super::traits::Model;
use crate::common::CtError;
use crate::scmd::builtins::vtor_noargs;
use crate::scmd::{CommandResponse, ScmdSpec};
use crate::sim::insn::InsnContext;
use crate::sim::source::JsonStreamSource;

/// Calculator registers, shared with the `accum` command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalcState {
    /// The accumulator.
    pub accum: i64,
    /// Count of instructions retired since `run`.
    pub pc: u64,
    /// Address of the `brk` that last trapped.
    pub last_trap: Option<u64>,
}

/// The calculator model.
#[derive(Clone, Debug, Default)]
pub struct Calc {
    state: Rc<RefCell<CalcState>>,
}

impl Calc {
    /// Creates a calculator with a zeroed accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory suitable for `Simulation::register_model`.
    pub fn create(_args: &[String]) -> Result<Box<dyn Model>, CtError> {
        Ok(Box::new(Self::new()))
    }

    /// Snapshot of the registers.
    pub fn state(&self) -> CalcState {
        self.state.borrow().clone()
    }

    fn step(&self, addr: u64, insn: &Value) -> Result<Step, CtError> {
        let invalid = || CtError::model(format!("invalid action encountered: \"{insn}\""));
        let op = insn.get("op").and_then(Value::as_str).ok_or_else(invalid)?;
        let value = insn.get("value").and_then(Value::as_i64).ok_or_else(invalid)?;

        let mut s = self.state.borrow_mut();
        let pre = s.accum;
        let post = match op {
            "add" => pre.checked_add(value),
            "sub" => pre.checked_sub(value),
            "mul" => pre.checked_mul(value),
            "div" if value == 0 => return Err(CtError::model("division by zero")),
            "div" => pre.checked_div(value),
            "set" => Some(value),
            "brk" if s.last_trap != Some(addr) => {
                s.last_trap = Some(addr);
                return Ok(Step::Trap);
            }
            "brk" => {
                s.last_trap = None;
                Some(pre)
            }
            other => return Err(CtError::model(format!("invalid opcode {other}"))),
        }
        .ok_or_else(|| CtError::model(format!("arithmetic overflow in \"{insn}\"")))?;

        let pc = s.pc;
        s.accum = post;
        s.pc += 1;
        Ok(Step::Done(json!({
            "pre": pre,
            "pc": pc,
            "insn": insn,
            "post": post,
            "nextpc": s.pc,
        })))
    }
}

enum Step {
    Done(Value),
    Trap,
}

impl Model for Calc {
    fn name(&self) -> &str {
        "Calc"
    }

    fn init(&mut self, args: &[String], reply: InitReply) {
        if args.len() > 1 {
            reply.fail(CtError::usage("run", format!("Usage: {} [infile]", self.name())));
            return;
        }
        *self.state.borrow_mut() = CalcState::default();

        match args.first() {
            None => reply.default_input(),
            Some(path) => match JsonStreamSource::open(path) {
                Ok(source) => reply.input(Box::new(source)),
                Err(e) => reply.fail(CtError::ModelInit(format!("{path}: {e}"))),
            },
        }
    }

    fn exec(&mut self, ictx: &InsnContext, completion: ExecCompletion) {
        match self.step(ictx.addr, &ictx.insn) {
            Ok(Step::Done(data)) => completion.done_with(data),
            Ok(Step::Trap) => completion.trap(),
            Err(e) => completion.fail(e),
        }
    }

    fn scmds(&mut self) -> Vec<ScmdSpec> {
        let state = Rc::clone(&self.state);
        vec![
            ScmdSpec::new("accum", move |_ctl, _cmd, responder| {
                let s = state.borrow();
                responder.finish(
                    CommandResponse::messages([format!("accumulator = {} (pc {})", s.accum, s.pc)])
                        .with_data(vec![json!({ "accum": s.accum, "pc": s.pc })]),
                );
            })
            .validator(vtor_noargs)
            .synopsis("show the calculator accumulator"),
        ]
    }
}
