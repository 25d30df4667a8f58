//! Simulation controller.
//!
//! The controller owns the run state, the breakpoint table, the attached
//! model and the pending/executing instruction slots. It implements:
//! 1. **Run state:** `resume`, `suspend` (deferred while an instruction executes) and `terminate`.
//! 2. **Instruction flow:** fetch scheduling, breakpoint marking, hand-off to the model and completion handling.
//! 3. **Model lifecycle:** attach, `run` initialisation and default input.
//!
//! The controller is only ever touched from tasks on the simulation's work
//! queue (or from `Simulation` between tasks), so it needs no locking.
//! Notifications are buffered in an outbox and delivered once the current
//! task has released the controller.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, trace, warn};

use super::breakpoints::{Breakpoint, BreakpointTable};
use super::engine::Engine;
use super::events::{EventKind, Notification, ObserverCounts, SuspendReason};
use super::insn::InsnContext;
use super::scheduler::Scheduler;
use super::source::InstructionSource;
use crate::common::CtError;
use crate::config::Config;
use crate::model::completion::{ExecEvent, InitOutcome, Ticket};
use crate::model::{ExecCompletion, InitReply, Model, ModelRegistry};
use crate::scmd::{CommandResponse, Dispatcher, Responder, ScmdSpec, builtins};
use crate::stats::SimStats;

/// Produces the instruction source used when a model asks for the default input.
pub type InputFactory = Box<dyn FnMut() -> Result<Box<dyn InstructionSource>, CtError>>;

/// Coarse simulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    /// No instruction source is attached.
    Inactive,
    /// A run exists but is not executing.
    Stopped,
    /// Instructions are being executed.
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inactive => "inactive",
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}

/// The instruction inside the model's `exec` call.
#[derive(Debug)]
struct Executing {
    ictx: InsnContext,
    data: Vec<Value>,
}

/// Run state, breakpoints, model and instruction slots.
pub struct Controller {
    config: Config,
    pub(crate) sched: Scheduler,
    counts: Rc<ObserverCounts>,
    outbox: Vec<Notification>,
    fatal: bool,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) stats: SimStats,

    pub(crate) models: ModelRegistry,
    model: Option<Box<dyn Model>>,
    model_scmds: Vec<String>,
    default_input: Option<InputFactory>,

    engine: Option<Engine>,
    /// Bumped whenever a run ends; stamps completions and fetches.
    generation: u64,
    running: bool,
    /// Deferred stop, applied at the next fetch.
    stop: Option<SuspendReason>,
    stepping: bool,
    completed: bool,

    pending: Option<InsnContext>,
    executing: Option<Executing>,
    step_waiter: Option<Responder>,
    breakpoints: BreakpointTable,
}

impl Controller {
    pub(crate) fn new(config: Config, sched: Scheduler, counts: Rc<ObserverCounts>) -> Self {
        let mut breakpoints = BreakpointTable::new();
        for &addr in &config.breakpoints {
            let _ = breakpoints.insert(addr);
        }

        let mut dispatcher = Dispatcher::default();
        for spec in builtins::scmds() {
            let name = spec.name().to_string();
            if let Err(e) = dispatcher.registry.register(spec) {
                error!(scmd = %name, %e, "failed to register built-in scmd");
            }
        }

        Self {
            config,
            sched,
            counts,
            outbox: Vec::new(),
            fatal: false,
            dispatcher,
            stats: SimStats::default(),
            models: ModelRegistry::default(),
            model: None,
            model_scmds: Vec::new(),
            default_input: None,
            engine: None,
            generation: 0,
            running: false,
            stop: None,
            stepping: false,
            completed: false,
            pending: None,
            executing: None,
            step_waiter: None,
            breakpoints,
        }
    }

    // Accessors.

    /// Returns true while instructions are being executed.
    pub const fn running(&self) -> bool {
        self.running
    }

    /// Coarse state of the simulation.
    pub const fn state(&self) -> RunState {
        if self.running {
            RunState::Running
        } else if self.engine.is_some() {
            RunState::Stopped
        } else {
            RunState::Inactive
        }
    }

    /// Returns true if the last run consumed its whole input.
    pub const fn completed(&self) -> bool {
        self.completed
    }

    /// Returns true if a run exists.
    pub const fn active(&self) -> bool {
        self.engine.is_some()
    }

    /// Name of the attached model.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(Model::name)
    }

    /// The pending instruction, if one has been fetched.
    pub const fn pending(&self) -> Option<&InsnContext> {
        self.pending.as_ref()
    }

    /// Address of the next instruction to execute, if known.
    pub fn next_addr(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|p| p.addr)
            .or_else(|| self.engine.as_ref().and_then(Engine::next_addr))
    }

    /// Session statistics.
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// The breakpoint table.
    pub const fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// The configuration the simulation was created with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Registers an additional command.
    pub fn register_scmd(&mut self, spec: ScmdSpec) -> Result<(), CtError> {
        self.dispatcher.registry.register(spec)
    }

    pub(crate) fn set_default_input(&mut self, factory: InputFactory) {
        self.default_input = Some(factory);
    }

    // Notifications.

    pub(crate) fn emit(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn take_fatal(&mut self) -> bool {
        std::mem::take(&mut self.fatal)
    }

    /// Records an internal error. The simulation is poisoned once the
    /// current task finishes.
    fn fault(&mut self, err: &CtError) {
        error!(%err, "fatal simulation error");
        self.fatal = true;
        self.emit(Notification::CtlError { err: err.body() });
    }

    // Run state.

    /// Starts or continues execution.
    ///
    /// # Returns
    ///
    /// False if the call honoured a deferred stop instead of resuming, or
    /// the simulation was already running.
    pub(crate) fn resume(&mut self, step: bool) -> bool {
        if self.running {
            return false;
        }
        // `stop` is only set while running and `halt` clears it, so this
        // fires only if a future path leaves a stop behind.
        if let Some(reason) = self.stop.take() {
            debug!(%reason, "deferred stop honoured instead of resuming");
            return false;
        }

        debug!(step, "resuming");
        self.running = true;
        self.stepping = step;
        self.stats.resumes += 1;
        self.emit(Notification::Resume);
        self.try_execute();
        self.schedule_fetch();
        true
    }

    /// Requests suspension.
    ///
    /// Never interrupts a model call: while an instruction executes, or a
    /// fetch is on its way, the stop is recorded and applied once the next
    /// instruction is pending.
    pub(crate) fn suspend(&mut self, reason: SuspendReason) {
        if !self.running {
            return;
        }
        let fetching = self.engine.as_ref().is_some_and(|e| e.fetch_outstanding);
        if self.executing.is_some() || (fetching && self.pending.is_none()) {
            debug!(%reason, "deferring suspend");
            self.stop = Some(reason);
            return;
        }
        self.halt(reason);
    }

    /// Transitions from running to stopped and announces it.
    ///
    /// A trap on the pending instruction is consumed here so resuming runs
    /// that instruction instead of stopping on it again.
    fn halt(&mut self, mut reason: SuspendReason) {
        self.running = false;
        self.stop = None;
        self.stepping = false;

        if let Some(pending) = self.pending.as_mut()
            && pending.trap
        {
            if reason == SuspendReason::Ctl {
                reason = if pending.breakpoint {
                    SuspendReason::Breakpoint
                } else {
                    SuspendReason::ModelTrap
                };
            }
            pending.trap = false;
            pending.breakpoint = false;
        }
        if reason == SuspendReason::Breakpoint {
            self.stats.breakpoint_hits += 1;
        }
        self.stats.suspends += 1;

        let addr = self.pending.as_ref().map(|p| p.addr);
        debug!(%reason, ?addr, "suspended");
        self.announce_suspend(reason, addr);
    }

    fn announce_suspend(&mut self, reason: SuspendReason, addr: Option<u64>) {
        self.emit(Notification::Suspend { reason, addr });
        if let Some(waiter) = self.step_waiter.take() {
            let line = match addr {
                Some(addr) => format!("{reason} at address {addr}"),
                None => format!("simulation {reason}"),
            };
            waiter.finish(
                CommandResponse::messages([line])
                    .with_data(vec![json!({ "reason": reason, "addr": addr })]),
            );
        }
    }

    /// Ends the current run.
    ///
    /// Clears both instruction slots, drops the engine and announces a
    /// `terminate` suspension if a run existed.
    pub(crate) fn terminate(&mut self) {
        let was_running = self.running;
        let had_run = was_running || self.engine.is_some();
        self.discard_run();
        self.running = false;

        if had_run {
            if was_running {
                self.stats.suspends += 1;
            }
            info!(completed = self.completed, "simulation terminated");
            self.announce_suspend(SuspendReason::Terminate, None);
        }
    }

    fn discard_run(&mut self) {
        self.pending = None;
        self.executing = None;
        self.stop = None;
        self.stepping = false;
        self.engine = None;
        self.generation += 1;
    }

    // Instruction flow.

    fn schedule_fetch(&mut self) {
        if self.pending.is_some() || self.executing.is_some() {
            return;
        }
        let generation = self.generation;
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if engine.fetch_outstanding || engine.is_exhausted() {
            return;
        }
        engine.fetch_outstanding = true;
        self.sched.defer(move |ctl| ctl.fetch_next(generation));
    }

    fn fetch_next(&mut self, generation: u64) {
        if generation != self.generation {
            trace!(generation, "dropping stale fetch");
            return;
        }
        let (Some(engine), Some(model)) = (self.engine.as_mut(), self.model.as_mut()) else {
            return;
        };
        engine.fetch_outstanding = false;

        match engine.fetch(model.as_mut()) {
            Ok(Some(ictx)) => self.on_fetch(ictx),
            Ok(None) => {
                info!("end of input");
                self.completed = true;
                self.terminate();
            }
            Err(err) => {
                warn!(%err, "instruction source failed");
                self.emit(Notification::ModelError { err: err.body() });
                self.terminate();
            }
        }
    }

    fn on_fetch(&mut self, mut ictx: InsnContext) {
        if let Some(pending) = &self.pending {
            let err = CtError::Invariant(format!(
                "fetched address {} while address {} is pending",
                ictx.addr, pending.addr
            ));
            self.fault(&err);
            return;
        }

        self.stats.insns_fetched += 1;
        trace!(addr = ictx.addr, "fetched instruction");
        if self.breakpoints.contains(ictx.addr) {
            ictx.trap = true;
            ictx.breakpoint = true;
        }
        self.pending = Some(ictx);

        if let Some(reason) = self.stop.take()
            && self.running
        {
            self.halt(reason);
            return;
        }
        self.try_execute();
    }

    fn try_execute(&mut self) {
        if !self.running || self.executing.is_some() {
            return;
        }
        let Some(ictx) = self.pending.take() else {
            return;
        };

        if ictx.trap {
            let reason = if ictx.breakpoint {
                SuspendReason::Breakpoint
            } else {
                SuspendReason::ModelTrap
            };
            self.pending = Some(ictx);
            self.halt(reason);
            return;
        }

        let Some(model) = self.model.as_mut() else {
            let err = CtError::Invariant(format!(
                "no model attached to execute address {}",
                ictx.addr
            ));
            self.pending = Some(ictx);
            self.fault(&err);
            return;
        };

        if self.stepping {
            self.stepping = false;
            self.stop = Some(SuspendReason::Ctl);
        }
        self.stats.insns_executed += 1;
        if self.config.general.trace_instructions || cfg!(feature = "always-trace") {
            info!(addr = ictx.addr, insn = %ictx.insn, "exec");
        } else {
            trace!(addr = ictx.addr, "exec");
        }

        let ticket = Ticket {
            generation: self.generation,
            addr: ictx.addr,
        };
        model.exec(&ictx, ExecCompletion::new(self.sched.clone(), ticket));
        self.executing = Some(Executing {
            ictx,
            data: Vec::new(),
        });
    }

    pub(crate) fn on_exec_event(&mut self, ticket: Ticket, event: ExecEvent) {
        let current = ticket.generation == self.generation
            && self
                .executing
                .as_ref()
                .is_some_and(|x| x.ictx.addr == ticket.addr);
        if !current {
            trace!(?ticket, "ignoring stale completion");
            return;
        }

        match event {
            ExecEvent::Data(payload) => {
                self.stats.data_payloads += 1;
                if !self.config.engine.gate_model_data || self.counts.active(EventKind::ModelData)
                {
                    self.emit(Notification::ModelData {
                        payload: payload.clone(),
                    });
                }
                if let Some(executing) = self.executing.as_mut() {
                    executing.data.push(payload);
                }
            }
            ExecEvent::Done => {
                let Some(Executing { ictx, data }) = self.executing.take() else {
                    return;
                };
                self.stats.insns_completed += 1;
                trace!(addr = ictx.addr, "instruction done");
                self.emit(Notification::InsnDone { ictx, data });
                self.schedule_fetch();
            }
            ExecEvent::Error(err) => {
                let Some(Executing { ictx, .. }) = self.executing.take() else {
                    return;
                };
                self.stats.insn_errors += 1;
                warn!(addr = ictx.addr, %err, "instruction failed");
                let body = err.body();
                self.emit(Notification::InsnError {
                    err: body.clone(),
                    ictx,
                });
                self.emit(Notification::ModelError { err: body });
                self.terminate();
            }
            ExecEvent::Trap => {
                let Some(Executing { mut ictx, .. }) = self.executing.take() else {
                    return;
                };
                self.stats.model_traps += 1;
                debug!(addr = ictx.addr, "model trap");
                ictx.trap = true;
                ictx.breakpoint = false;
                if self.pending.is_some() {
                    let err = CtError::Invariant(format!(
                        "model trapped on address {} with another instruction pending",
                        ictx.addr
                    ));
                    self.fault(&err);
                    return;
                }
                self.pending = Some(ictx.clone());
                self.stop = None;
                self.try_execute();
                self.emit(Notification::InsnTrap { ictx });
            }
        }
    }

    // Model lifecycle.

    /// Attaches `model`, replacing any model already attached.
    ///
    /// The model's scmds replace those of the previous model. If any of
    /// them collides with a registered command nothing changes.
    pub(crate) fn attach(&mut self, mut model: Box<dyn Model>) -> Result<(), CtError> {
        if self.running {
            return Err(CtError::scmd("a simulation model is running"));
        }

        let mut registry = self.dispatcher.registry.clone();
        for name in &self.model_scmds {
            let _ = registry.unregister(name);
        }
        let mut names = Vec::new();
        for spec in model.scmds() {
            names.push(spec.name().to_string());
            registry.register(spec)?;
        }

        if let Some(old) = self.model_name().map(str::to_owned) {
            info!(model = %old, "detaching model");
            self.terminate();
        }
        info!(model = %model.name(), "attached model");
        self.dispatcher.registry = registry;
        self.model_scmds = names;
        self.model = Some(model);
        self.completed = false;
        Ok(())
    }

    /// Asks the attached model for an instruction source; the run starts
    /// when it replies.
    pub(crate) fn begin_run(&mut self, args: &[String], responder: Responder) {
        let Some(model) = self.model.as_mut() else {
            responder.fail(CtError::scmd("no simulation model is attached"));
            return;
        };
        if self.running {
            responder.fail(CtError::scmd("simulation is already running"));
            return;
        }
        debug!(model = %model.name(), ?args, "initializing model");
        model.init(args, InitReply::new(self.sched.clone(), responder));
    }

    pub(crate) fn on_init_reply(&mut self, responder: Responder, outcome: InitOutcome) {
        let source = match outcome {
            InitOutcome::Input(source) => Ok(source),
            InitOutcome::DefaultInput => match self.default_input.as_mut() {
                Some(factory) => factory(),
                None => Err(CtError::ModelInit("no default input is configured".into())),
            },
            InitOutcome::Failed(err) => Err(err),
        };

        match source {
            Ok(source) if !self.running && self.model.is_some() => {
                self.start_run(source);
                responder.done();
            }
            Ok(_) => responder.fail(CtError::scmd("simulation state changed during init")),
            Err(err @ CtError::ModelInit(_)) => responder.fail(err),
            Err(err) => responder.fail(CtError::ModelInit(err.to_string())),
        }
    }

    fn start_run(&mut self, source: Box<dyn InstructionSource>) {
        if self.engine.is_some() {
            debug!("discarding previous run");
            self.discard_run();
        }
        self.engine = Some(Engine::new(source, self.config.engine.start_addr));
        self.completed = false;
        info!(start_addr = self.config.engine.start_addr, "run started");
        let _ = self.resume(false);
    }

    /// Installs the responder that `step` completes at the next suspend.
    pub(crate) fn begin_step(&mut self, responder: Responder) {
        self.step_waiter = Some(responder);
        // The step handler rejects running simulations, so `resume` only
        // declines here through the deferred-stop branch above.
        if !self.resume(true)
            && let Some(waiter) = self.step_waiter.take()
        {
            waiter.finish(CommandResponse::messages(["simulation stopped"]));
        }
    }

    // Breakpoints.

    /// Inserts a breakpoint, marking the pending instruction if it matches.
    pub(crate) fn set_breakpoint(&mut self, addr: u64) -> (Breakpoint, bool) {
        let result = self.breakpoints.insert(addr);
        if let Some(pending) = self.pending.as_mut()
            && pending.addr == addr
        {
            pending.trap = true;
            pending.breakpoint = true;
        }
        result
    }

    /// Unmarks the pending instruction if `removed` was trapping it.
    fn untrap_pending(&mut self, removed: Option<Breakpoint>) -> Option<Breakpoint> {
        let bp = removed?;
        if let Some(pending) = self.pending.as_mut()
            && pending.addr == bp.addr
            && pending.breakpoint
        {
            pending.trap = false;
            pending.breakpoint = false;
        }
        Some(bp)
    }

    pub(crate) fn delete_breakpoint_id(&mut self, id: u32) -> Option<Breakpoint> {
        let removed = self.breakpoints.remove_id(id);
        self.untrap_pending(removed)
    }

    pub(crate) fn delete_breakpoint_addr(&mut self, addr: u64) -> Option<Breakpoint> {
        let removed = self.breakpoints.remove_addr(addr);
        self.untrap_pending(removed)
    }

    pub(crate) fn delete_all_breakpoints(&mut self) -> usize {
        if let Some(pending) = self.pending.as_mut()
            && pending.breakpoint
        {
            pending.trap = false;
            pending.breakpoint = false;
        }
        self.breakpoints.clear()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("model", &self.model_name())
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("stop", &self.stop)
            .field("pending", &self.pending)
            .field("executing", &self.executing)
            .field("breakpoints", &self.breakpoints)
            .finish_non_exhaustive()
    }
}
