//! Response handle for a command in flight.

use std::fmt;

use tracing::warn;

use super::command::CommandResponse;
use crate::common::CtError;
use crate::sim::scheduler::Scheduler;

/// Streams responses for one command.
///
/// `partial` and `message` may be called any number of times; exactly one
/// of `finish`, `done` or `fail` ends the stream. Every call is delivered
/// asynchronously. Dropping a responder without ending the stream fails the
/// command.
pub struct Responder {
    sched: Scheduler,
    serial: u64,
    finished: bool,
}

impl Responder {
    pub(crate) const fn new(sched: Scheduler, serial: u64) -> Self {
        Self {
            sched,
            serial,
            finished: false,
        }
    }

    /// Sends a non-terminal response.
    ///
    /// Terminal markers in `resp` are stripped.
    pub fn partial(&self, mut resp: CommandResponse) {
        resp.done = false;
        resp.err = None;
        self.post(resp, false);
    }

    /// Sends a non-terminal response with one operator message.
    pub fn message(&self, text: impl Into<String>) {
        self.partial(CommandResponse::messages([text.into()]));
    }

    /// Sends the terminal response.
    ///
    /// If `resp` carries no error, it is marked done.
    pub fn finish(mut self, mut resp: CommandResponse) {
        if resp.err.is_none() {
            resp.done = true;
        }
        self.finished = true;
        self.post(resp, true);
    }

    /// Ends the stream successfully with no payload.
    pub fn done(self) {
        self.finish(CommandResponse::done());
    }

    /// Ends the stream with an error.
    pub fn fail(self, err: CtError) {
        self.finish(CommandResponse::error(&err));
    }

    fn post(&self, resp: CommandResponse, terminal: bool) {
        let serial = self.serial;
        self.sched
            .defer(move |ctl| ctl.respond(serial, resp, terminal));
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if !self.finished {
            warn!(serial = self.serial, "scmd handler dropped its responder");
            self.post(
                CommandResponse::error(&CtError::scmd("scmd handler did not respond")),
                true,
            );
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("serial", &self.serial)
            .field("finished", &self.finished)
            .finish()
    }
}
