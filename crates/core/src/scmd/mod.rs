//! Control commands.
//!
//! This module implements the control channel. It provides:
//! 1. **Records:** `Command` and `CommandResponse`, the wire shapes.
//! 2. **Registry:** `ScmdSpec` descriptors keyed by name and alias.
//! 3. **Dispatch:** Schema check, lookup, validation and handler invocation, one command at a time.
//! 4. **Built-ins:** `attach`, `run`, `cont`, `step`, `stop`, breakpoints, `status` and `scmds`.

/// Built-in commands.
pub mod builtins;

/// Command and response records.
pub mod command;

/// Dispatch of commands to handlers.
pub mod dispatcher;

/// Command registry.
pub mod registry;

/// Response handles.
pub mod responder;

pub use command::{Command, CommandResponse};
pub use dispatcher::Dispatcher;
pub use registry::{ScmdHandler, ScmdRegistry, ScmdSpec, ScmdValidator};
pub use responder::Responder;
