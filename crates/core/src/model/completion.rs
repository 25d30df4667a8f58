//! Completion handles handed to models.
//!
//! Models finish their work asynchronously by calling a handle. Every call
//! posts a task to the simulation's work queue; nothing re-enters the
//! controller directly. A handle's terminal method consumes it, and a handle
//! dropped without a terminal call reports a broken promise instead of
//! leaving the simulation waiting forever.

use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::common::CtError;
use crate::scmd::Responder;
use crate::sim::scheduler::Scheduler;
use crate::sim::source::InstructionSource;

/// Identifies the execution a completion belongs to.
///
/// The generation changes whenever a run ends, so completions from an
/// abandoned run can be recognised and ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) generation: u64,
    pub(crate) addr: u64,
}

/// What a model reported about an executing instruction.
#[derive(Debug)]
pub(crate) enum ExecEvent {
    Data(Value),
    Done,
    Error(CtError),
    Trap,
}

/// Completion handle for one instruction.
///
/// Call `data` any number of times, then exactly one of `done`, `done_with`,
/// `fail` or `trap`.
pub struct ExecCompletion {
    sched: Scheduler,
    ticket: Ticket,
    finished: bool,
}

impl ExecCompletion {
    pub(crate) const fn new(sched: Scheduler, ticket: Ticket) -> Self {
        Self {
            sched,
            ticket,
            finished: false,
        }
    }

    /// Address of the instruction this handle completes.
    pub const fn addr(&self) -> u64 {
        self.ticket.addr
    }

    /// Reports an intermediate data payload.
    pub fn data(&self, payload: Value) {
        self.post(ExecEvent::Data(payload));
    }

    /// Reports successful completion.
    pub fn done(mut self) {
        self.finish(ExecEvent::Done);
    }

    /// Reports one final payload and successful completion.
    pub fn done_with(self, payload: Value) {
        self.data(payload);
        self.done();
    }

    /// Reports that execution failed. This ends the run.
    pub fn fail(mut self, err: CtError) {
        self.finish(ExecEvent::Error(err));
    }

    /// Asks the simulation to suspend before this instruction is consumed.
    ///
    /// The instruction stays pending and is executed again on resume.
    pub fn trap(mut self) {
        self.finish(ExecEvent::Trap);
    }

    fn finish(&mut self, event: ExecEvent) {
        self.finished = true;
        self.post(event);
    }

    fn post(&self, event: ExecEvent) {
        let ticket = self.ticket;
        self.sched
            .defer(move |ctl| ctl.on_exec_event(ticket, event));
    }
}

impl Drop for ExecCompletion {
    fn drop(&mut self) {
        if !self.finished {
            warn!(addr = self.ticket.addr, "model dropped an instruction completion");
            self.post(ExecEvent::Error(CtError::model(format!(
                "model abandoned instruction at address {}",
                self.ticket.addr
            ))));
        }
    }
}

impl fmt::Debug for ExecCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecCompletion")
            .field("ticket", &self.ticket)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Outcome of `Model::init`.
pub(crate) enum InitOutcome {
    Input(Box<dyn InstructionSource>),
    DefaultInput,
    Failed(CtError),
}

/// Reply handle for `Model::init`.
///
/// Exactly one of `input`, `default_input` or `fail` must be called.
pub struct InitReply {
    sched: Scheduler,
    responder: Option<Responder>,
}

impl InitReply {
    pub(crate) const fn new(sched: Scheduler, responder: Responder) -> Self {
        Self {
            sched,
            responder: Some(responder),
        }
    }

    /// Starts the run reading from `source`.
    pub fn input(mut self, source: Box<dyn InstructionSource>) {
        self.reply(InitOutcome::Input(source));
    }

    /// Starts the run reading from the simulation's default input.
    pub fn default_input(mut self) {
        self.reply(InitOutcome::DefaultInput);
    }

    /// Fails the `run` command.
    pub fn fail(mut self, err: CtError) {
        self.reply(InitOutcome::Failed(err));
    }

    fn reply(&mut self, outcome: InitOutcome) {
        if let Some(responder) = self.responder.take() {
            self.sched
                .defer(move |ctl| ctl.on_init_reply(responder, outcome));
        }
    }
}

impl Drop for InitReply {
    fn drop(&mut self) {
        if self.responder.is_some() {
            warn!("model dropped its init reply");
            self.reply(InitOutcome::Failed(CtError::ModelInit(
                "model did not provide an instruction source".into(),
            )));
        }
    }
}

impl fmt::Debug for InitReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitReply")
            .field("pending", &self.responder.is_some())
            .finish()
    }
}
