//! Built-in commands.
//!
//! Every handler answers through its responder, so the response always
//! arrives on a later turn even when the handler has nothing to wait for.

use serde_json::json;

use super::command::{Command, CommandResponse};
use super::registry::ScmdSpec;
use super::responder::Responder;
use crate::common::{CtError, parse_addr};
use crate::sim::controller::Controller;
use crate::sim::events::SuspendReason;

/// Built-in command descriptors.
pub(crate) fn scmds() -> Vec<ScmdSpec> {
    vec![
        ScmdSpec::new("$a", scmd_algol).hidden(),
        ScmdSpec::new("attach", scmd_attach)
            .aliases([":A"])
            .validator(vtor_attach)
            .synopsis("attach to a simulation model"),
        ScmdSpec::new("bp", scmd_bp)
            .aliases([":b"])
            .validator(vtor_bp)
            .synopsis("set a breakpoint"),
        ScmdSpec::new("cont", scmd_cont)
            .aliases([":c", "c"])
            .validator(vtor_noargs)
            .synopsis("continue simulation"),
        ScmdSpec::new("delete", scmd_delete)
            .aliases([":d"])
            .validator(vtor_delete)
            .synopsis("delete breakpoints"),
        ScmdSpec::new("events", scmd_events)
            .aliases(["$b"])
            .validator(vtor_noargs)
            .synopsis("list breakpoints"),
        ScmdSpec::new("run", scmd_run)
            .aliases([":r"])
            .synopsis("run simulation from the beginning"),
        ScmdSpec::new("scmds", scmd_scmds)
            .validator(vtor_noargs)
            .synopsis("list available scmds"),
        ScmdSpec::new("status", scmd_status)
            .validator(vtor_noargs)
            .synopsis("simulation status"),
        ScmdSpec::new("step", scmd_step)
            .aliases([":s"])
            .validator(vtor_noargs)
            .synopsis("simulate the next event"),
        ScmdSpec::new("stop", scmd_stop)
            .validator(vtor_noargs)
            .hidden(),
    ]
}

/// Rejects any address or arguments.
pub fn vtor_noargs(cmd: &Command) -> Result<(), String> {
    if !cmd.args().is_empty() {
        return Err(format!("scmd \"{}\" accepts no arguments", cmd.scmd));
    }
    if cmd.addr.is_some() {
        return Err(format!("scmd \"{}\" accepts no address", cmd.scmd));
    }
    Ok(())
}

fn vtor_attach(cmd: &Command) -> Result<(), String> {
    if cmd.args().is_empty() {
        return Err(format!("scmd \"{}\" requires at least 1 argument", cmd.scmd));
    }
    Ok(())
}

/// The address a breakpoint command refers to: the command address or its
/// single argument, never both.
fn bp_target(cmd: &Command) -> Result<u64, String> {
    let text = match (cmd.addr.as_deref(), cmd.args()) {
        (Some(addr), []) => addr,
        (None, [arg]) => arg.as_str(),
        _ => {
            return Err(format!(
                "scmd \"{}\" requires exactly one address",
                cmd.scmd
            ));
        }
    };
    parse_addr(text).ok_or_else(|| format!("invalid address \"{text}\""))
}

fn vtor_bp(cmd: &Command) -> Result<(), String> {
    bp_target(cmd).map(|_| ())
}

/// What `delete` removes.
enum DeleteTarget {
    All,
    Id(u32),
    Addr(u64),
}

fn delete_target(cmd: &Command) -> Result<DeleteTarget, String> {
    match (cmd.addr.as_deref(), cmd.args()) {
        (Some(addr), []) => parse_addr(addr)
            .map(DeleteTarget::Addr)
            .ok_or_else(|| format!("invalid address \"{addr}\"")),
        (None, [arg]) if arg == "all" => Ok(DeleteTarget::All),
        (None, [arg]) => arg
            .parse()
            .map(DeleteTarget::Id)
            .map_err(|_| format!("invalid breakpoint id \"{arg}\"")),
        _ => Err(format!(
            "scmd \"{}\" requires an address, a breakpoint id or \"all\"",
            cmd.scmd
        )),
    }
}

fn vtor_delete(cmd: &Command) -> Result<(), String> {
    delete_target(cmd).map(|_| ())
}

fn scmd_algol(_ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    responder.finish(CommandResponse::messages(["no adb here"]));
}

fn scmd_attach(ctl: &mut Controller, cmd: &Command, responder: Responder) {
    let Some((name, args)) = cmd.args().split_first() else {
        responder.fail(CtError::usage(&cmd.scmd, "missing model name"));
        return;
    };
    if ctl.running() {
        responder.fail(CtError::scmd("a simulation model is running"));
        return;
    }

    let model = match ctl.models.create(name, args) {
        Ok(model) => model,
        Err(e) => {
            responder.fail(CtError::scmd(format!(
                "unable to attach to model \"{name}\": {e}"
            )));
            return;
        }
    };
    let model_name = model.name().to_string();
    match ctl.attach(model) {
        Ok(()) => responder.finish(CommandResponse::messages([format!(
            "attached to simulation model {model_name}"
        )])),
        Err(e) => responder.fail(e),
    }
}

fn scmd_cont(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    if let Err(e) = check_resumable(ctl) {
        responder.fail(e);
        return;
    }
    let _ = ctl.resume(false);
    responder.done();
}

fn check_resumable(ctl: &Controller) -> Result<(), CtError> {
    if ctl.running() {
        return Err(CtError::scmd("simulation model is already running"));
    }
    if ctl.completed() {
        return Err(CtError::scmd("the simulation has completed"));
    }
    if !ctl.active() {
        return Err(CtError::scmd("no simulation is active"));
    }
    Ok(())
}

fn scmd_run(ctl: &mut Controller, cmd: &Command, responder: Responder) {
    ctl.begin_run(cmd.args(), responder);
}

fn scmd_step(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    if let Err(e) = check_resumable(ctl) {
        responder.fail(e);
        return;
    }
    ctl.begin_step(responder);
}

fn scmd_stop(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    ctl.suspend(SuspendReason::Ctl);
    responder.done();
}

fn scmd_bp(ctl: &mut Controller, cmd: &Command, responder: Responder) {
    let addr = match bp_target(cmd) {
        Ok(addr) => addr,
        Err(reason) => {
            responder.fail(CtError::usage(&cmd.scmd, reason));
            return;
        }
    };
    let (bp, created) = ctl.set_breakpoint(addr);
    let line = if created {
        format!("breakpoint {} set at address {}", bp.id, bp.addr)
    } else {
        format!("breakpoint {} already set at address {}", bp.id, bp.addr)
    };
    responder.finish(
        CommandResponse::messages([line]).with_data(vec![json!({ "id": bp.id, "addr": bp.addr })]),
    );
}

fn scmd_delete(ctl: &mut Controller, cmd: &Command, responder: Responder) {
    let target = match delete_target(cmd) {
        Ok(target) => target,
        Err(reason) => {
            responder.fail(CtError::usage(&cmd.scmd, reason));
            return;
        }
    };
    let result = match target {
        DeleteTarget::All => {
            let n = ctl.delete_all_breakpoints();
            Ok(format!("deleted {n} breakpoint(s)"))
        }
        DeleteTarget::Id(id) => ctl
            .delete_breakpoint_id(id)
            .map(|bp| format!("deleted breakpoint {} at address {}", bp.id, bp.addr))
            .ok_or_else(|| CtError::scmd(format!("no breakpoint with id {id}"))),
        DeleteTarget::Addr(addr) => ctl
            .delete_breakpoint_addr(addr)
            .map(|bp| format!("deleted breakpoint {} at address {}", bp.id, bp.addr))
            .ok_or_else(|| CtError::scmd(format!("no breakpoint at address {addr}"))),
    };
    match result {
        Ok(line) => responder.finish(CommandResponse::messages([line])),
        Err(e) => responder.fail(e),
    }
}

fn scmd_events(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    let (lines, data): (Vec<_>, Vec<_>) = ctl
        .breakpoints()
        .iter()
        .map(|bp| {
            (
                format!("{}\tbreakpoint at address {}", bp.id, bp.addr),
                json!({ "id": bp.id, "addr": bp.addr }),
            )
        })
        .unzip();
    responder.finish(CommandResponse::messages(lines).with_data(data));
}

fn scmd_scmds(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    responder.finish(CommandResponse::messages(ctl.dispatcher.registry.listing()));
}

fn scmd_status(ctl: &mut Controller, _cmd: &Command, responder: Responder) {
    let Some(model) = ctl.model_name() else {
        responder.finish(CommandResponse::messages(["no simulation model is attached"]));
        return;
    };

    let state = ctl.state();
    let mut lines = vec![format!("attached to simulation model {model} ({state})")];
    if let Some(addr) = ctl.next_addr() {
        lines.push(format!("next instruction at address {addr}"));
    }
    lines.push(ctl.stats().summary());

    let data = json!({
        "model": model,
        "state": state,
        "addr": ctl.next_addr(),
        "stats": ctl.stats(),
    });
    responder.finish(CommandResponse::messages(lines).with_data(vec![data]));
}
