//! Control harness for driving simulation models one instruction at a time.
//!
//! This crate implements an mdb-style debugger loop wrapped around a
//! single-step-capable simulation engine:
//! 1. **Engine:** Pulls instructions from a model-supplied source and hands them to the model one at a time.
//! 2. **Control:** Validates command records and routes them to registered handlers, one command in flight.
//! 3. **Controller:** Owns run state, breakpoints and the pending/executing slots; emits lifecycle notifications.
//! 4. **Models:** The `Model` contract, completion handles, and a demonstration calculator.
//! 5. **Simulation:** Configuration, statistics, and the cooperative work queue that interleaves it all.

/// Common types (errors, address parsing).
pub mod common;
/// Harness configuration (defaults, JSON loading).
pub mod config;
/// Model contract, completion handles, model registry and the calculator model.
pub mod model;
/// Command records, responses, registry, dispatcher and built-in commands.
pub mod scmd;
/// Engine, controller, breakpoints, notifications and the simulation handle.
pub mod sim;
/// Run statistics collection and reporting.
pub mod stats;

/// Crate-wide error type.
pub use crate::common::{CtError, ErrorBody};
/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Model contract implemented by simulation plugins.
pub use crate::model::{ExecCompletion, InitReply, InsnCheck, Model};
/// Command and response wire records.
pub use crate::scmd::{Command, CommandResponse, Responder, ScmdSpec};
/// Top-level simulation handle; construct with `Simulation::new`.
pub use crate::sim::{EventKind, InsnContext, Notification, RunState, Simulation, SuspendReason};
