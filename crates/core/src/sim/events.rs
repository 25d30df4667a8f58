//! Lifecycle notifications and their observers.
//!
//! This module defines what the controller tells the outside world. It provides:
//! 1. **Notifications:** The `Notification` enum and its JSON form (`{"event": "...", ...}`).
//! 2. **Kinds:** `EventKind`, one per notification variant, used to subscribe.
//! 3. **Observers:** Subscription bookkeeping with per-kind reference counts, so
//!    producers can stay quiet while nobody listens.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use super::insn::InsnContext;
use crate::common::ErrorBody;
use crate::scmd::CommandResponse;

/// Why the simulation stopped running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuspendReason {
    /// The pending instruction matched a breakpoint.
    Breakpoint,
    /// The model asked to trap on the pending instruction.
    ModelTrap,
    /// An operator stop or the end of a single step.
    Ctl,
    /// End of input, fatal error, or model detach.
    Terminate,
}

impl fmt::Display for SuspendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Breakpoint => "breakpoint",
            Self::ModelTrap => "model trap",
            Self::Ctl => "stopped",
            Self::Terminate => "terminated",
        })
    }
}

/// A fire-and-forget lifecycle notification.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Notification {
    /// The simulation started running.
    Resume,
    /// The simulation stopped running.
    Suspend {
        /// Why it stopped.
        reason: SuspendReason,
        /// Address of the pending instruction, if one was fetched.
        addr: Option<u64>,
    },
    /// An instruction completed.
    InsnDone {
        /// The instruction that completed.
        ictx: InsnContext,
        /// Data payloads the model produced for it.
        data: Vec<Value>,
    },
    /// An instruction failed; the run is over.
    InsnError {
        /// What went wrong.
        err: ErrorBody,
        /// The instruction that failed.
        ictx: InsnContext,
    },
    /// The model trapped on an instruction before consuming it.
    InsnTrap {
        /// The instruction, left pending.
        ictx: InsnContext,
    },
    /// A data payload produced by the model.
    ModelData {
        /// The payload.
        payload: Value,
    },
    /// The model or its instruction source failed.
    ModelError {
        /// What went wrong.
        err: ErrorBody,
    },
    /// A response to a control command.
    CtlResponse(CommandResponse),
    /// The control path failed fatally; the simulation is unusable.
    CtlError {
        /// What went wrong.
        err: ErrorBody,
    },
}

impl Notification {
    /// Kind used to route this notification to subscribers.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Resume => EventKind::Resume,
            Self::Suspend { .. } => EventKind::Suspend,
            Self::InsnDone { .. } => EventKind::InsnDone,
            Self::InsnError { .. } => EventKind::InsnError,
            Self::InsnTrap { .. } => EventKind::InsnTrap,
            Self::ModelData { .. } => EventKind::ModelData,
            Self::ModelError { .. } => EventKind::ModelError,
            Self::CtlResponse(_) => EventKind::CtlResponse,
            Self::CtlError { .. } => EventKind::CtlError,
        }
    }
}

/// Notification kinds, for subscribing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `resume`
    Resume,
    /// `suspend`
    Suspend,
    /// `insn-done`
    InsnDone,
    /// `insn-error`
    InsnError,
    /// `insn-trap`
    InsnTrap,
    /// `model-data`
    ModelData,
    /// `model-error`
    ModelError,
    /// `ctl-response`
    CtlResponse,
    /// `ctl-error`
    CtlError,
}

impl EventKind {
    /// Number of kinds.
    pub const COUNT: usize = 9;

    /// Every kind, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Resume,
        Self::Suspend,
        Self::InsnDone,
        Self::InsnError,
        Self::InsnTrap,
        Self::ModelData,
        Self::ModelError,
        Self::CtlResponse,
        Self::CtlError,
    ];

    /// Wire name of the kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Suspend => "suspend",
            Self::InsnDone => "insn-done",
            Self::InsnError => "insn-error",
            Self::InsnTrap => "insn-trap",
            Self::ModelData => "model-data",
            Self::ModelError => "model-error",
            Self::CtlResponse => "ctl-response",
            Self::CtlError => "ctl-error",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Handle returned by `Simulation::subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// A subscribed callback.
pub type Observer = Rc<RefCell<dyn FnMut(&Notification)>>;

/// Live subscriber counts per kind.
///
/// Shared between the observer list (which updates it) and the controller
/// (which consults it before producing optional notifications).
#[derive(Debug, Default)]
pub struct ObserverCounts {
    counts: [Cell<usize>; EventKind::COUNT],
}

impl ObserverCounts {
    /// Number of subscribers for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.counts[kind.index()].get()
    }

    /// Returns true if anyone is subscribed to `kind`.
    pub fn active(&self, kind: EventKind) -> bool {
        self.count(kind) > 0
    }

    fn incr(&self, kind: EventKind) {
        let cell = &self.counts[kind.index()];
        cell.set(cell.get() + 1);
    }

    fn decr(&self, kind: EventKind) {
        let cell = &self.counts[kind.index()];
        cell.set(cell.get().saturating_sub(1));
    }
}

/// The subscriber list.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    entries: BTreeMap<u64, (EventKind, Observer)>,
    counts: Rc<ObserverCounts>,
}

impl Observers {
    pub(crate) fn new(counts: Rc<ObserverCounts>) -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            counts,
        }
    }

    pub(crate) fn subscribe(&mut self, kind: EventKind, observer: Observer) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        let _ = self.entries.insert(id, (kind, observer));
        self.counts.incr(kind);
        SubscriptionId(id)
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.entries.remove(&id.0) {
            Some((kind, _)) => {
                self.counts.decr(kind);
                true
            }
            None => false,
        }
    }

    /// Observers for `kind` in subscription order.
    pub(crate) fn matching(&self, kind: EventKind) -> Vec<Observer> {
        self.entries
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, o)| Rc::clone(o))
            .collect()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribed", &self.entries.len())
            .field("counts", &self.counts)
            .finish()
    }
}
