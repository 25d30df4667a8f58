//! # Controller Tests
//!
//! Drives the run-state machine through the command surface: run, cont,
//! step, stop, breakpoints, model traps, failures and model attachment.
//! Each test checks the notification stream as an observer sees it.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use ct_core::config::Config;
use ct_core::model::{ExecCompletion, Model};
use ct_core::scmd::{CommandResponse, Responder, ScmdSpec};
use ct_core::sim::{InsnContext, JsonStreamSource};
use ct_core::{Command, CtError, EventKind, Notification, RunState, SuspendReason};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::common::harness::TestContext;
use crate::common::mocks::model::{Echo, ManualModel};

fn adds(n: usize) -> Vec<Value> {
    vec![json!({ "op": "add", "value": 1 }); n]
}

fn messages(resp: &CommandResponse) -> Vec<String> {
    resp.messages.clone().unwrap_or_default()
}

fn calc_session(program: Vec<Value>) -> TestContext {
    TestContext::new().with_program(program).with_calc()
}

#[test]
fn test_run_to_completion() {
    let mut ctx = calc_session(vec![
        json!({ "op": "set", "value": 5 }),
        json!({ "op": "add", "value": 3 }),
    ]);
    let _ = ctx.ok(Command::new("run"));

    let kinds: Vec<EventKind> = ctx.events().iter().map(Notification::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Resume,
            EventKind::CtlResponse,
            EventKind::ModelData,
            EventKind::InsnDone,
            EventKind::ModelData,
            EventKind::InsnDone,
            EventKind::Suspend,
        ]
    );
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);

    let done = ctx.done();
    assert_eq!(done[0].0.addr, 0);
    assert_eq!(
        done[0].1,
        vec![json!({
            "pre": 0,
            "pc": 0,
            "insn": { "op": "set", "value": 5 },
            "post": 5,
            "nextpc": 1,
        })]
    );
    assert_eq!(done[1].1[0]["pre"], 5);
    assert_eq!(done[1].1[0]["post"], 8);

    assert!(!ctx.sim.running().unwrap());
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
    assert!(ctx.sim.with_controller(|ctl| ctl.completed()).unwrap());
}

#[test]
fn test_cont_after_completion() {
    let mut ctx = calc_session(adds(1));
    let _ = ctx.ok(Command::new("run"));
    assert_eq!(ctx.err(Command::new("cont")), "the simulation has completed");
    assert_eq!(ctx.err(Command::new("step")), "the simulation has completed");
}

#[test]
fn test_resume_requires_a_run() {
    let mut ctx = TestContext::new();
    assert_eq!(ctx.err(Command::new("cont")), "no simulation is active");
    assert_eq!(ctx.err(Command::new("step")), "no simulation is active");
    assert_eq!(ctx.err(Command::new("run")), "no simulation model is attached");
}

#[test]
fn test_stop_defers_until_next_instruction_is_pending() {
    let (model, held) = ManualModel::new();
    let mut ctx = TestContext::new().with_program(adds(3)).with_model(model);

    let _ = ctx.ok(Command::new("run"));
    assert_eq!(held.started(), vec![0]);
    assert_eq!(ctx.sim.state().unwrap(), RunState::Running);

    let _ = ctx.ok(Command::new("stop"));
    assert!(ctx.suspends().is_empty(), "stop must not interrupt exec");
    assert_eq!(ctx.sim.state().unwrap(), RunState::Running);

    assert_eq!(held.complete(), 0);
    let _ = ctx.drain();
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Ctl, Some(1))]);
    assert_eq!(ctx.done_addrs(), vec![0]);
    assert_eq!(held.started(), vec![0], "address 1 must stay pending");
    assert_eq!(ctx.sim.addr().unwrap(), Some(1));
    assert_eq!(ctx.sim.state().unwrap(), RunState::Stopped);

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(held.started(), vec![0, 1]);
}

#[test]
fn test_stop_between_completion_and_fetch() {
    let (model, held) = ManualModel::new();
    let mut ctx = TestContext::new().with_program(adds(3)).with_model(model);
    let _ = ctx.ok(Command::new("run"));

    let _ = held.complete();
    ctx.sim.inject_ctl(&Command::new("stop")).unwrap();
    let _ = ctx.drain();

    assert_eq!(ctx.suspends(), vec![(SuspendReason::Ctl, Some(1))]);
    assert_eq!(held.started(), vec![0]);
}

#[test]
fn test_stop_when_not_running() {
    let mut ctx = calc_session(adds(1));
    let _ = ctx.ok(Command::new("stop"));
    assert!(ctx.suspends().is_empty());
    assert_eq!(ctx.count(EventKind::Resume), 0);
}

#[test]
fn test_busy_while_running() {
    let (model, _held) = ManualModel::new();
    let mut ctx = TestContext::new().with_program(adds(2)).with_model(model);
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.err(Command::new("run")), "simulation is already running");
    assert_eq!(ctx.err(Command::new("cont")), "simulation model is already running");
    assert_eq!(ctx.err(Command::new("step")), "simulation model is already running");
    assert_eq!(
        ctx.err(Command::new("attach").with_args(["calc"])),
        "a simulation model is running"
    );
}

#[test]
fn test_step_executes_one_instruction() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["0"]));
    let _ = ctx.ok(Command::new("run"));
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Breakpoint, Some(0))]);
    assert!(ctx.done_addrs().is_empty());

    let resp = ctx.ok(Command::new("step"));
    assert_eq!(messages(&resp), vec!["stopped at address 1"]);
    assert_eq!(resp.data, Some(vec![json!({ "reason": "ctl", "addr": 1 })]));
    assert_eq!(ctx.done_addrs(), vec![0]);

    let resp = ctx.ok(Command::new(":s"));
    assert_eq!(messages(&resp), vec!["stopped at address 2"]);
    assert_eq!(ctx.done_addrs(), vec![0, 1]);

    let resp = ctx.ok(Command::new("step"));
    assert_eq!(messages(&resp), vec!["simulation terminated"]);
    assert_eq!(resp.data, Some(vec![json!({ "reason": "terminate", "addr": null })]));
    assert_eq!(ctx.done_addrs(), vec![0, 1, 2]);

    assert_eq!(
        ctx.suspends(),
        vec![
            (SuspendReason::Breakpoint, Some(0)),
            (SuspendReason::Ctl, Some(1)),
            (SuspendReason::Ctl, Some(2)),
            (SuspendReason::Terminate, None),
        ]
    );
}

#[test]
fn test_step_emits_data_for_one_instruction_only() {
    let (model, held) = ManualModel::new();
    let mut ctx = TestContext::new().with_program(adds(3)).with_model(model);
    let _ = ctx.ok(Command::new("bp").with_args(["0"]));
    let _ = ctx.ok(Command::new("run"));
    assert!(held.started().is_empty());

    for addr in 0..2 {
        ctx.clear();
        ctx.sim.inject_ctl(&Command::new("step")).unwrap();
        let _ = ctx.drain();
        assert_eq!(held.started(), (0..=addr).collect::<Vec<u64>>());
        assert_eq!(ctx.count(EventKind::ModelData), 0);

        assert_eq!(held.complete(), addr);
        let _ = ctx.drain();

        let payloads: Vec<Value> = ctx
            .events()
            .into_iter()
            .filter_map(|n| match n {
                Notification::ModelData { payload } => Some(payload),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec![json!({ "addr": addr })]);
        assert_eq!(ctx.suspends(), vec![(SuspendReason::Ctl, Some(addr + 1))]);
        assert_eq!(held.started().len() as u64, addr + 1, "next address must not start");
        assert_eq!(held.len(), 0);
    }
}

#[test]
fn test_step_response_follows_suspend() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["0"]));
    let _ = ctx.ok(Command::new("run"));
    ctx.clear();

    let _ = ctx.ok(Command::new("step"));
    let events = ctx.events();
    let suspend = events
        .iter()
        .position(|n| n.kind() == EventKind::Suspend)
        .unwrap();
    let response = events
        .iter()
        .position(|n| n.kind() == EventKind::CtlResponse)
        .unwrap();
    assert!(suspend < response);
}

#[test]
fn test_breakpoint_then_cont_runs_same_address() {
    let mut ctx = calc_session(adds(4));
    let resp = ctx.ok(Command::new("bp").with_addr("2"));
    assert_eq!(messages(&resp), vec!["breakpoint 1 set at address 2"]);
    assert_eq!(resp.data, Some(vec![json!({ "id": 1, "addr": 2 })]));

    let _ = ctx.ok(Command::new("run"));
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Breakpoint, Some(2))]);
    assert_eq!(ctx.done_addrs(), vec![0, 1]);
    assert_eq!(ctx.sim.pending().unwrap().map(|p| (p.addr, p.trap)), Some((2, false)));

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(ctx.done_addrs(), vec![0, 1, 2, 3]);
    assert_eq!(ctx.sim.stats().unwrap().breakpoint_hits, 1);
}

#[test]
fn test_breakpoint_set_during_run() {
    let (model, held) = ManualModel::new();
    let mut ctx = TestContext::new().with_program(adds(4)).with_model(model);
    let _ = ctx.ok(Command::new("run"));
    let _ = ctx.ok(Command::new(":b").with_args(["2"]));

    assert_eq!(held.complete(), 0);
    let _ = ctx.drain();
    assert_eq!(held.complete(), 1);
    let _ = ctx.drain();

    assert_eq!(ctx.suspends(), vec![(SuspendReason::Breakpoint, Some(2))]);
    assert_eq!(held.started(), vec![0, 1]);

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(held.started(), vec![0, 1, 2]);
}

#[test]
fn test_breakpoint_on_pending_instruction() {
    let mut ctx = calc_session(adds(4));
    let _ = ctx.ok(Command::new("bp").with_args(["1"]));
    let _ = ctx.ok(Command::new("run"));
    let _ = ctx.ok(Command::new("delete").with_args(["all"]));

    let resp = ctx.ok(Command::new("bp").with_args(["1"]));
    assert_eq!(messages(&resp), vec!["breakpoint 2 set at address 1"]);
    assert_eq!(ctx.sim.pending().unwrap().map(|p| p.trap), Some(true));

    // The stopped instruction is now trapped again.
    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(
        ctx.suspends(),
        vec![
            (SuspendReason::Breakpoint, Some(1)),
            (SuspendReason::Breakpoint, Some(1)),
        ]
    );
    assert_eq!(ctx.done_addrs(), vec![0]);

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(ctx.done_addrs(), vec![0, 1, 2, 3]);
}

#[test]
fn test_deleting_breakpoint_untraps_pending() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["0"]));
    let _ = ctx.ok(Command::new("run"));
    let _ = ctx.ok(Command::new("bp").with_args(["0"]));
    assert_eq!(ctx.sim.pending().unwrap().map(|p| p.trap), Some(true));

    let resp = ctx.ok(Command::new(":d").with_addr("0"));
    assert_eq!(messages(&resp), vec!["deleted breakpoint 1 at address 0"]);
    assert_eq!(ctx.sim.pending().unwrap().map(|p| p.trap), Some(false));

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(ctx.done_addrs(), vec![0, 1, 2]);
    assert_eq!(ctx.suspends().len(), 2);
}

#[test]
fn test_breakpoint_commands() {
    let mut ctx = TestContext::new();
    let _ = ctx.ok(Command::new("bp").with_args(["3"]));
    let _ = ctx.ok(Command::new("bp").with_args(["0x5"]));

    let resp = ctx.ok(Command::new("bp").with_args(["3"]));
    assert_eq!(messages(&resp), vec!["breakpoint 1 already set at address 3"]);

    let resp = ctx.ok(Command::new("events"));
    assert_eq!(
        messages(&resp),
        vec!["1\tbreakpoint at address 3", "2\tbreakpoint at address 5"]
    );
    assert_eq!(
        resp.data,
        Some(vec![json!({ "id": 1, "addr": 3 }), json!({ "id": 2, "addr": 5 })])
    );

    let resp = ctx.ok(Command::new("delete").with_args(["1"]));
    assert_eq!(messages(&resp), vec!["deleted breakpoint 1 at address 3"]);
    assert_eq!(ctx.err(Command::new("delete").with_args(["1"])), "no breakpoint with id 1");
    assert_eq!(
        ctx.err(Command::new("delete").with_addr("7")),
        "no breakpoint at address 7"
    );
    assert_eq!(
        ctx.err(Command::new("delete").with_args(["x"])),
        "syntax error invoking scmd \"delete\": invalid breakpoint id \"x\""
    );

    let resp = ctx.ok(Command::new("delete").with_args(["all"]));
    assert_eq!(messages(&resp), vec!["deleted 1 breakpoint(s)"]);
    assert!(ctx.sim.breakpoints().unwrap().is_empty());

    let resp = ctx.ok(Command::new("events"));
    assert_eq!(resp.messages, Some(vec![]));

    let resp = ctx.ok(Command::new("bp").with_args(["3"]));
    assert_eq!(messages(&resp), vec!["breakpoint 3 set at address 3"]);
}

#[test]
fn test_model_trap() {
    let mut ctx = calc_session(vec![
        json!({ "op": "set", "value": 1 }),
        json!({ "op": "brk", "value": 0 }),
        json!({ "op": "add", "value": 2 }),
    ]);
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.suspends(), vec![(SuspendReason::ModelTrap, Some(1))]);
    assert_eq!(ctx.done_addrs(), vec![0]);
    let trap = ctx
        .events()
        .into_iter()
        .find_map(|n| match n {
            Notification::InsnTrap { ictx } => Some(ictx),
            _ => None,
        })
        .unwrap();
    assert_eq!((trap.addr, trap.trap, trap.breakpoint), (1, true, false));
    assert_eq!(ctx.sim.pending().unwrap().map(|p| (p.addr, p.trap)), Some((1, false)));

    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(ctx.done_addrs(), vec![0, 1, 2]);
    let resp = ctx.ok(Command::new("accum"));
    assert_eq!(messages(&resp), vec!["accumulator = 3 (pc 3)"]);
    assert_eq!(ctx.sim.stats().unwrap().model_traps, 1);
}

#[test]
fn test_exec_error_terminates() {
    let mut ctx = calc_session(vec![
        json!({ "op": "set", "value": 1 }),
        json!({ "op": "div", "value": 0 }),
        json!({ "op": "add", "value": 1 }),
    ]);
    let _ = ctx.ok(Command::new("run"));

    let events = ctx.events();
    let insn_error = events
        .iter()
        .find_map(|n| match n {
            Notification::InsnError { err, ictx } => Some((err.message.clone(), ictx.addr)),
            _ => None,
        })
        .unwrap();
    assert_eq!(insn_error, ("division by zero".to_string(), 1));
    assert_eq!(ctx.count(EventKind::ModelError), 1);
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);
    assert_eq!(ctx.done_addrs(), vec![0]);
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
    assert_eq!(ctx.err(Command::new("cont")), "no simulation is active");
    assert_eq!(ctx.sim.stats().unwrap().insn_errors, 1);
}

/// Drops every completion handle without reporting.
struct Forgetful;

impl Model for Forgetful {
    fn name(&self) -> &str {
        "Forgetful"
    }

    fn exec(&mut self, _ictx: &InsnContext, _completion: ExecCompletion) {}
}

#[test]
fn test_abandoned_completion_fails_instruction() {
    let mut ctx = TestContext::new().with_program(adds(2)).with_model(Forgetful);
    let _ = ctx.ok(Command::new("run"));

    let err = ctx
        .events()
        .into_iter()
        .find_map(|n| match n {
            Notification::ModelError { err } => Some(err.message),
            _ => None,
        })
        .unwrap();
    assert_eq!(err, "model abandoned instruction at address 0");
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);
}

#[test]
fn test_source_error_terminates() {
    let text = "{\"op\":\"set\",\"value\":1}\n}\n";
    let mut ctx = TestContext::new().with_calc();
    ctx.sim.set_default_input(move || {
        Ok(Box::new(JsonStreamSource::new(Cursor::new(text.as_bytes().to_vec()))))
    });
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.done_addrs(), vec![0]);
    let err = ctx
        .events()
        .into_iter()
        .find_map(|n| match n {
            Notification::ModelError { err } => Some(err.message),
            _ => None,
        })
        .unwrap();
    assert!(err.starts_with("instruction source error: line 2:"), "{err}");
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);
    assert!(!ctx.sim.with_controller(|ctl| ctl.completed()).unwrap());
}

#[test]
fn test_run_without_default_input() {
    let mut ctx = TestContext::new().with_calc();
    assert_eq!(
        ctx.err(Command::new("run")),
        "model init failed: no default input is configured"
    );
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
}

#[test]
fn test_run_restarts_from_the_beginning() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["1"]));
    let _ = ctx.ok(Command::new("run"));
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.done_addrs(), vec![0, 0]);
    assert_eq!(
        ctx.suspends(),
        vec![
            (SuspendReason::Breakpoint, Some(1)),
            (SuspendReason::Breakpoint, Some(1)),
        ]
    );
}

#[test]
fn test_config_breakpoints_and_start_address() {
    let config = Config::from_json_str(r#"{ "engine": { "start_addr": 10 }, "breakpoints": [12] }"#)
        .unwrap();
    let mut ctx = TestContext::with_config(config)
        .with_program(adds(4))
        .with_calc();
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.done_addrs(), vec![10, 11]);
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Breakpoint, Some(12))]);
}

#[test]
fn test_run_past_last_address_terminates() {
    let config =
        Config::from_json_str(r#"{ "engine": { "start_addr": 18446744073709551615 } }"#).unwrap();
    let mut ctx = TestContext::with_config(config)
        .with_program(adds(2))
        .with_calc();
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(ctx.done_addrs(), vec![u64::MAX]);
    assert_eq!(ctx.count(EventKind::ModelError), 1);
    assert_eq!(ctx.suspends(), vec![(SuspendReason::Terminate, None)]);
    assert!(!ctx.sim.is_poisoned());
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
}

#[test]
fn test_status_reports_state() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["1"]));
    let _ = ctx.ok(Command::new("run"));

    let resp = ctx.ok(Command::new("status"));
    let lines = messages(&resp);
    assert_eq!(lines[0], "attached to simulation model Calc (stopped)");
    assert_eq!(lines[1], "next instruction at address 1");
    assert!(lines[2].starts_with("fetched=2 executed=1 completed=1"));

    let data = resp.data.unwrap();
    let data = &data[0];
    assert_eq!(data["model"], "Calc");
    assert_eq!(data["state"], "stopped");
    assert_eq!(data["addr"], 1);
    assert_eq!(data["stats"]["breakpoint_hits"], 1);
}

#[test]
fn test_model_data_follows_subscription() {
    let ctx = TestContext::new();
    let sim = ctx.sim.clone();
    let seen = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&seen);
    let id = sim.subscribe(EventKind::ModelData, move |_| *counter.borrow_mut() += 1);

    let mut ctx = ctx.with_program(adds(4)).with_calc();
    let _ = ctx.ok(Command::new("bp").with_args(["2"]));
    let _ = ctx.ok(Command::new("run"));
    assert_eq!(*seen.borrow(), 2);

    assert!(sim.unsubscribe(id));
    assert!(!sim.unsubscribe(id));
    let _ = ctx.ok(Command::new("cont"));
    assert_eq!(*seen.borrow(), 2);

    assert_eq!(ctx.done().iter().filter(|(_, data)| data.len() == 1).count(), 4);
    assert_eq!(sim.stats().unwrap().data_payloads, 4);
}

#[test]
fn test_model_data_not_produced_without_subscribers() {
    let sim = ct_core::Simulation::new(Config::default());
    sim.register_model("calc", ct_core::model::Calc::create).unwrap();
    sim.set_default_input(|| Ok(Box::new(ct_core::sim::VecSource::new(adds(2)))));

    let done = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&done);
    let _ = sim.subscribe(EventKind::InsnDone, move |n| sink.borrow_mut().push(n.clone()));

    sim.inject_ctl(&Command::new("attach").with_args(["calc"])).unwrap();
    let _ = sim.run_until_idle().unwrap();
    sim.inject_ctl(&Command::new("run")).unwrap();
    let _ = sim.run_until_idle().unwrap();

    assert_eq!(done.borrow().len(), 2);
    assert_eq!(sim.stats().unwrap().data_payloads, 2);
    assert!(sim.with_controller(|ctl| ctl.config().engine.gate_model_data).unwrap());
}

#[test]
fn test_ctl_error_poisons() {
    let ctx = TestContext::new();
    let err = ctx.sim.inject_ctl_json("this is not json").unwrap_err();
    assert!(matches!(err, CtError::Control(_)));

    assert_eq!(ctx.count(EventKind::CtlError), 1);
    assert!(ctx.sim.is_poisoned());
    assert!(matches!(ctx.sim.turn(), Err(CtError::Poisoned)));
    assert!(matches!(
        ctx.sim.inject_ctl(&Command::new("status")),
        Err(CtError::Poisoned)
    ));
}

#[test]
fn test_json_command_text() {
    let ctx = TestContext::new();
    ctx.sim
        .inject_ctl_json(r#"{ "scmd": "bp", "args": ["4"], "tag": "j" }"#)
        .unwrap();
    let _ = ctx.drain();
    assert!(!ctx.sim.is_poisoned());
    assert_eq!(ctx.sim.breakpoints().unwrap().len(), 1);

    ctx.sim.inject_ctl_json(r#"{ "verb": "bp" }"#).unwrap();
    let _ = ctx.drain();
    assert!(!ctx.sim.is_poisoned());
}

#[test]
fn test_attach_replaces_model_scmds() {
    let mut ctx = calc_session(adds(3));
    let resp = ctx.ok(Command::new("scmds"));
    assert!(messages(&resp).iter().any(|l| l.starts_with("accum\t")));
    let _ = ctx.ok(Command::new("accum"));

    ctx.sim.attach_standalone(Box::new(Echo)).unwrap();
    assert_eq!(ctx.err(Command::new("accum")), "scmd \"accum\" is unknown");

    let resp = ctx.ok(Command::new(":A").with_args(["calc"]));
    assert_eq!(messages(&resp), vec!["attached to simulation model Calc"]);
    let _ = ctx.ok(Command::new("accum"));
}

/// Offers a command that collides with a built-in.
struct Clashing;

impl Model for Clashing {
    fn name(&self) -> &str {
        "Clashing"
    }

    fn scmds(&mut self) -> Vec<ScmdSpec> {
        vec![ScmdSpec::new("bp", |_ctl, _cmd, responder: Responder| responder.done())]
    }
}

#[test]
fn test_attach_collision_leaves_model_in_place() {
    let mut ctx = calc_session(adds(1));
    ctx.sim
        .register_model("clash", |_args| Ok(Box::new(Clashing)))
        .unwrap();

    assert_eq!(
        ctx.err(Command::new("attach").with_args(["clash"])),
        "scmd \"bp\" is already registered"
    );
    let resp = ctx.ok(Command::new("status"));
    assert_eq!(messages(&resp)[0], "attached to simulation model Calc (inactive)");
    let _ = ctx.ok(Command::new("accum"));
}

#[test]
fn test_attach_unknown_model() {
    let mut ctx = TestContext::new();
    assert_eq!(
        ctx.err(Command::new("attach").with_args(["nope"])),
        "unable to attach to model \"nope\": failed to load simulation model \"nope\""
    );
}

#[test]
fn test_attach_terminates_stopped_run() {
    let mut ctx = calc_session(adds(3));
    let _ = ctx.ok(Command::new("bp").with_args(["1"]));
    let _ = ctx.ok(Command::new("run"));
    let _ = ctx.ok(Command::new("attach").with_args(["calc"]));

    assert_eq!(
        ctx.suspends(),
        vec![
            (SuspendReason::Breakpoint, Some(1)),
            (SuspendReason::Terminate, None),
        ]
    );
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
    assert_eq!(ctx.err(Command::new("cont")), "no simulation is active");
}

#[test]
fn test_observer_can_drive_the_simulation() {
    let ctx = calc_session(adds(4));
    let sim = ctx.sim.clone();
    let _ = ctx.sim.subscribe(EventKind::Suspend, move |n| {
        if let Notification::Suspend { reason: SuspendReason::Breakpoint, .. } = n {
            sim.inject_ctl(&Command::new("cont")).unwrap();
        }
    });

    for addr in ["1", "3"] {
        ctx.sim.inject_ctl(&Command::new("bp").with_args([addr])).unwrap();
        let _ = ctx.drain();
    }
    ctx.sim.inject_ctl(&Command::new("run")).unwrap();
    let _ = ctx.drain();

    assert_eq!(ctx.done_addrs(), vec![0, 1, 2, 3]);
    assert_eq!(ctx.sim.stats().unwrap().breakpoint_hits, 2);
}

/// Queries the simulation from inside `exec`, then completes.
struct Introspective {
    sim: ct_core::Simulation,
    seen: Rc<RefCell<Vec<bool>>>,
}

impl Model for Introspective {
    fn name(&self) -> &str {
        "Introspective"
    }

    fn exec(&mut self, _ictx: &InsnContext, completion: ExecCompletion) {
        let results = [
            matches!(self.sim.state(), Err(CtError::Invariant(_))),
            matches!(self.sim.running(), Err(CtError::Invariant(_))),
            matches!(self.sim.addr(), Err(CtError::Invariant(_))),
            matches!(self.sim.pending(), Err(CtError::Invariant(_))),
            matches!(self.sim.stats(), Err(CtError::Invariant(_))),
            matches!(self.sim.breakpoints(), Err(CtError::Invariant(_))),
        ];
        self.seen.borrow_mut().extend(results);
        completion.done();
    }
}

#[test]
fn test_queries_from_inside_exec_fail_cleanly() {
    let ctx = TestContext::new().with_program(adds(1));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let model = Introspective {
        sim: ctx.sim.clone(),
        seen: Rc::clone(&seen),
    };
    let mut ctx = ctx.with_model(model);
    let _ = ctx.ok(Command::new("run"));

    assert_eq!(*seen.borrow(), vec![true; 6]);
    assert_eq!(ctx.done_addrs(), vec![0]);
    assert_eq!(ctx.sim.state().unwrap(), RunState::Inactive);
}
