//! Simulation engine and control.
//!
//! This module contains the instruction-driving half of the harness:
//! 1. **Work Queue:** `Scheduler`, the cooperative FIFO every asynchronous step runs through.
//! 2. **Engine:** Fetches instructions from an `InstructionSource` and numbers them.
//! 3. **Controller:** Run state, deferred stop, breakpoints and the pending/executing slots.
//! 4. **Notifications:** Lifecycle events and observer subscriptions.
//! 5. **Simulation:** The public handle tying these together.

/// Breakpoint table.
pub mod breakpoints;

/// Simulation controller state machine.
pub mod controller;

/// Fetch side of a run.
pub mod engine;

/// Notifications and observers.
pub mod events;

/// Instruction-with-context records.
pub mod insn;

/// Cooperative work queue.
pub mod scheduler;

/// Public simulation handle.
pub mod simulation;

/// Instruction sources.
pub mod source;

pub use breakpoints::{Breakpoint, BreakpointTable};
pub use controller::{Controller, InputFactory, RunState};
pub use engine::Engine;
pub use events::{EventKind, Notification, SubscriptionId, SuspendReason};
pub use insn::InsnContext;
pub use simulation::Simulation;
pub use source::{InstructionSource, JsonStreamSource, VecSource};
