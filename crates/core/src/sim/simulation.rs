//! Simulation handle.
//!
//! `Simulation` is the embedding surface of the harness: it registers models
//! and commands, accepts control input, runs the work queue and fans
//! notifications out to observers. Cloning the handle shares the same
//! simulation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{error, warn};

use super::breakpoints::Breakpoint;
use super::controller::{Controller, RunState};
use super::events::{EventKind, Notification, ObserverCounts, Observers, SubscriptionId};
use super::insn::InsnContext;
use super::scheduler::Scheduler;
use super::source::InstructionSource;
use crate::common::CtError;
use crate::config::Config;
use crate::model::Model;
use crate::scmd::{Command, ScmdSpec};
use crate::stats::SimStats;

struct SimInner {
    ctl: RefCell<Controller>,
    sched: Scheduler,
    observers: RefCell<Observers>,
    poisoned: Cell<bool>,
}

/// A single-threaded simulation driven by a cooperative work queue.
///
/// # Examples
///
/// ```
/// use ct_core::model::Calc;
/// use ct_core::sim::source::VecSource;
/// use ct_core::{Command, Config, EventKind, Simulation};
/// use serde_json::json;
///
/// let sim = Simulation::new(Config::default());
/// sim.register_model("calc", |_args| Ok(Box::new(Calc::new()))).unwrap();
/// sim.set_default_input(|| {
///     Ok(Box::new(VecSource::new([json!({ "op": "set", "value": 2 })])))
/// });
///
/// sim.inject_ctl(&Command::new("attach").with_args(["calc"])).unwrap();
/// sim.run_until_idle().unwrap();
/// sim.inject_ctl(&Command::new("run")).unwrap();
/// sim.run_until_idle().unwrap();
///
/// assert_eq!(sim.stats().unwrap().insns_completed, 1);
/// ```
#[derive(Clone)]
pub struct Simulation {
    inner: Rc<SimInner>,
}

impl Simulation {
    /// Creates a simulation with the built-in commands registered.
    pub fn new(config: Config) -> Self {
        let sched = Scheduler::default();
        let counts = Rc::new(ObserverCounts::default());
        let ctl = Controller::new(config, sched.clone(), Rc::clone(&counts));
        Self {
            inner: Rc::new(SimInner {
                ctl: RefCell::new(ctl),
                sched,
                observers: RefCell::new(Observers::new(counts)),
                poisoned: Cell::new(false),
            }),
        }
    }

    fn check(&self) -> Result<(), CtError> {
        if self.inner.poisoned.get() {
            return Err(CtError::Poisoned);
        }
        Ok(())
    }

    fn with_ctl<R>(&self, f: impl FnOnce(&mut Controller) -> R) -> Result<R, CtError> {
        self.check()?;
        let mut ctl = self
            .inner
            .ctl
            .try_borrow_mut()
            .map_err(|_| CtError::Invariant("simulation re-entered from inside a task".into()))?;
        Ok(f(&mut ctl))
    }

    /// Registers an additional command.
    pub fn register_scmd(&self, spec: ScmdSpec) -> Result<(), CtError> {
        self.with_ctl(|ctl| ctl.register_scmd(spec))?
    }

    /// Makes a model available to `attach` under `name`.
    pub fn register_model(
        &self,
        name: &str,
        factory: impl Fn(&[String]) -> Result<Box<dyn Model>, CtError> + 'static,
    ) -> Result<(), CtError> {
        self.with_ctl(|ctl| ctl.models.register(name, Rc::new(factory)))?
    }

    /// Installs the source factory used when a model asks for the default input.
    pub fn set_default_input(
        &self,
        factory: impl FnMut() -> Result<Box<dyn InstructionSource>, CtError> + 'static,
    ) {
        if let Err(e) = self.with_ctl(|ctl| ctl.set_default_input(Box::new(factory))) {
            warn!(%e, "cannot set default input");
        }
    }

    /// Attaches a model directly, without going through `attach`.
    pub fn attach_standalone(&self, model: Box<dyn Model>) -> Result<(), CtError> {
        let result = self.with_ctl(|ctl| ctl.attach(model))?;
        self.flush();
        result
    }

    /// Submits a command.
    ///
    /// # Returns
    ///
    /// `CtError::CommandInFlight` if the previous command has not produced
    /// its terminal response yet.
    pub fn inject_ctl(&self, cmd: &Command) -> Result<(), CtError> {
        self.inject_ctl_value(serde_json::to_value(cmd)?)
    }

    /// Submits a raw command record. Malformed records are answered with an
    /// error response.
    pub fn inject_ctl_value(&self, raw: Value) -> Result<(), CtError> {
        self.with_ctl(|ctl| ctl.submit(raw))?
    }

    /// Submits one command encoded as JSON text.
    ///
    /// Text that is not JSON means the control channel itself is broken:
    /// a `ctl-error` is emitted and the simulation is poisoned.
    pub fn inject_ctl_json(&self, text: &str) -> Result<(), CtError> {
        self.check()?;
        match serde_json::from_str(text) {
            Ok(raw) => self.inject_ctl_value(raw),
            Err(e) => {
                let err = CtError::Control(e.to_string());
                self.poison(&err);
                Err(err)
            }
        }
    }

    /// Calls `observer` for every notification of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        observer: impl FnMut(&Notification) + 'static,
    ) -> SubscriptionId {
        self.inner
            .observers
            .borrow_mut()
            .subscribe(kind, Rc::new(RefCell::new(observer)))
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.borrow_mut().unsubscribe(id)
    }

    /// Runs one queued task and delivers what it produced.
    ///
    /// # Returns
    ///
    /// False if the queue was empty.
    pub fn turn(&self) -> Result<bool, CtError> {
        self.check()?;
        let Some(task) = self.inner.sched.pop() else {
            return Ok(false);
        };

        let (outbox, fatal) = self.with_ctl(|ctl| {
            task(ctl);
            (ctl.take_outbox(), ctl.take_fatal())
        })?;

        if fatal {
            self.inner.poisoned.set(true);
            self.inner.sched.clear();
        }
        self.deliver(outbox);
        Ok(true)
    }

    /// Runs tasks until the queue is empty.
    ///
    /// # Returns
    ///
    /// The number of tasks run.
    pub fn run_until_idle(&self) -> Result<usize, CtError> {
        let mut n = 0;
        while self.turn()? {
            n += 1;
        }
        Ok(n)
    }

    /// Returns true after a fatal error.
    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.get()
    }

    /// Returns true while instructions are being executed.
    pub fn running(&self) -> Result<bool, CtError> {
        self.with_controller(Controller::running)
    }

    /// Coarse state of the simulation.
    pub fn state(&self) -> Result<RunState, CtError> {
        self.with_controller(Controller::state)
    }

    /// Address of the pending instruction, if any.
    pub fn addr(&self) -> Result<Option<u64>, CtError> {
        self.with_controller(|ctl| ctl.pending().map(|p| p.addr))
    }

    /// A copy of the pending instruction, if any.
    pub fn pending(&self) -> Result<Option<InsnContext>, CtError> {
        self.with_controller(|ctl| ctl.pending().cloned())
    }

    /// A snapshot of the session statistics.
    pub fn stats(&self) -> Result<SimStats, CtError> {
        self.with_controller(|ctl| ctl.stats().clone())
    }

    /// Breakpoints in id order.
    pub fn breakpoints(&self) -> Result<Vec<Breakpoint>, CtError> {
        self.with_controller(|ctl| ctl.breakpoints().iter().collect())
    }

    /// Runs `f` with the controller borrowed. The accessors above are built
    /// on it and work after the simulation is poisoned.
    ///
    /// # Returns
    ///
    /// `CtError::Invariant` if called from inside a task.
    pub fn with_controller<R>(&self, f: impl FnOnce(&Controller) -> R) -> Result<R, CtError> {
        let ctl = self
            .inner
            .ctl
            .try_borrow()
            .map_err(|_| CtError::Invariant("simulation re-entered from inside a task".into()))?;
        Ok(f(&ctl))
    }

    fn flush(&self) {
        let outbox = match self.inner.ctl.try_borrow_mut() {
            Ok(mut ctl) => ctl.take_outbox(),
            Err(_) => return,
        };
        self.deliver(outbox);
    }

    fn poison(&self, err: &CtError) {
        error!(%err, "fatal control channel error");
        self.inner.poisoned.set(true);
        self.inner.sched.clear();
        self.deliver(vec![Notification::CtlError { err: err.body() }]);
    }

    fn deliver(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let observers = self.inner.observers.borrow().matching(notification.kind());
            for observer in observers {
                match observer.try_borrow_mut() {
                    Ok(mut f) => f(&notification),
                    Err(_) => warn!(
                        event = notification.kind().name(),
                        "observer re-entered; notification dropped"
                    ),
                }
            }
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Simulation");
        let _ = s
            .field("queued", &self.inner.sched.len())
            .field("poisoned", &self.inner.poisoned.get());
        if let Ok(ctl) = self.inner.ctl.try_borrow() {
            let _ = s.field("controller", &*ctl);
        }
        s.finish_non_exhaustive()
    }
}
