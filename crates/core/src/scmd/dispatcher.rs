//! Command dispatch.
//!
//! Commands are dispatched one at a time. A submitted command is checked
//! against the command schema, resolved in the registry, validated, and
//! finally handed to its handler. Every outcome, including rejection,
//! reaches the caller as a `ctl-response` notification on a later turn.

use serde_json::Value;
use tracing::{debug, trace};

use super::command::{Command, CommandResponse};
use super::registry::ScmdRegistry;
use super::responder::Responder;
use crate::common::CtError;
use crate::sim::controller::Controller;
use crate::sim::events::Notification;

/// The command currently awaiting its terminal response.
#[derive(Debug)]
struct InFlight {
    serial: u64,
    tag: Option<String>,
}

/// Dispatcher state: the registry and the in-flight slot.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pub(crate) registry: ScmdRegistry,
    in_flight: Option<InFlight>,
    next_serial: u64,
}

impl Controller {
    /// Accepts a raw command record for dispatch on a later turn.
    ///
    /// # Returns
    ///
    /// `CtError::CommandInFlight` if the previous command has not finished;
    /// the transport must serialize submissions.
    pub(crate) fn submit(&mut self, raw: Value) -> Result<(), CtError> {
        if self.dispatcher.in_flight.is_some() {
            return Err(CtError::CommandInFlight);
        }
        let serial = self.dispatcher.next_serial;
        self.dispatcher.next_serial += 1;
        let tag = raw.get("tag").and_then(Value::as_str).map(str::to_owned);
        self.dispatcher.in_flight = Some(InFlight { serial, tag });
        self.sched.defer(move |ctl| ctl.dispatch(serial, raw));
        Ok(())
    }

    fn dispatch(&mut self, serial: u64, raw: Value) {
        self.stats.scmds_dispatched += 1;
        let responder = Responder::new(self.sched.clone(), serial);

        let cmd = match Command::from_value(raw) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("rejecting malformed scmd");
                responder.fail(e);
                return;
            }
        };

        let Some(entry) = self.dispatcher.registry.lookup(&cmd.scmd) else {
            debug!(scmd = %cmd.scmd, "unknown scmd");
            responder.fail(CtError::UnknownScmd(cmd.scmd.clone()));
            return;
        };

        if let Some(validator) = &entry.validator
            && let Err(reason) = validator(&cmd)
        {
            debug!(scmd = %cmd.scmd, %reason, "scmd failed validation");
            responder.fail(CtError::usage(&cmd.scmd, reason));
            return;
        }

        debug!(scmd = %entry.name, addr = ?cmd.addr, args = ?cmd.args, "dispatching scmd");
        (entry.handler)(self, &cmd, responder);
    }

    /// Delivers one response for command `serial`.
    pub(crate) fn respond(&mut self, serial: u64, mut resp: CommandResponse, terminal: bool) {
        let Some(in_flight) = &self.dispatcher.in_flight else {
            trace!(serial, "dropping response with no scmd in flight");
            return;
        };
        if in_flight.serial != serial {
            trace!(serial, "dropping response for a finished scmd");
            return;
        }

        resp.tag.clone_from(&in_flight.tag);
        if terminal {
            if resp.err.is_some() {
                self.stats.scmds_failed += 1;
            }
            self.dispatcher.in_flight = None;
        }
        self.emit(Notification::CtlResponse(resp));
    }
}
