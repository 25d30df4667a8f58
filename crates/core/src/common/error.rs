//! Harness error definitions.
//!
//! This module defines the error handling for the harness. It provides:
//! 1. **Error Taxonomy:** One variant per failure class (validation, execution, source, internal).
//! 2. **Wire Form:** `ErrorBody`, the cloneable `err` record carried by responses and notifications.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the harness.
///
/// Validation errors are scoped to one command. Execution and source errors
/// end the current run. Invariant and transport errors poison the whole
/// simulation.
#[derive(Debug, Error)]
pub enum CtError {
    /// The command record did not match the command schema.
    #[error("internal error: malformed scmd")]
    MalformedScmd,

    /// No handler is registered under the command name.
    #[error("scmd \"{0}\" is unknown")]
    UnknownScmd(String),

    /// A command validator rejected the invocation.
    #[error("syntax error invoking scmd \"{scmd}\": {reason}")]
    Usage {
        /// The command as invoked.
        scmd: String,
        /// What the validator objected to.
        reason: String,
    },

    /// A command name or alias collides with an existing registration.
    #[error("scmd \"{0}\" is already registered")]
    AlreadyRegistered(String),

    /// A command handler failed.
    #[error("{0}")]
    Scmd(String),

    /// No model is registered under the requested name.
    #[error("failed to load simulation model \"{0}\"")]
    UnknownModel(String),

    /// A model could not prepare an instruction source.
    #[error("model init failed: {0}")]
    ModelInit(String),

    /// A model reported an error while executing an instruction.
    #[error("{0}")]
    Model(String),

    /// The instruction source produced malformed input.
    #[error("instruction source error: {0}")]
    Source(String),

    /// JSON decoding failed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control channel delivered bytes that are not a command.
    #[error("control channel error: {0}")]
    Control(String),

    /// A command was submitted while another one is still in flight.
    #[error("a command is already in flight")]
    CommandInFlight,

    /// An internal invariant was violated.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// The simulation hit a fatal error earlier and can no longer be used.
    #[error("simulation is unusable after a fatal error")]
    Poisoned,

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CtError {
    /// Builds a handler failure from anything printable.
    pub fn scmd(message: impl Into<String>) -> Self {
        Self::Scmd(message.into())
    }

    /// Builds a model execution failure from anything printable.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Builds a usage error for `scmd`.
    pub fn usage(scmd: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Usage {
            scmd: scmd.into(),
            reason: reason.into(),
        }
    }

    /// Flattens the error into its wire form.
    pub fn body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string())
    }
}

/// Wire form of an error: `{ "message": ... }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description.
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
