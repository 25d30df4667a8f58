//! CT control harness CLI.
//!
//! This binary wires a simulation to the process's standard streams. It performs:
//! 1. **Control input:** Reads one JSON command record per line from stdin, between queue turns, so `stop` reaches a running simulation.
//! 2. **Notifications:** Writes every notification as one JSON line to stdout.
//! 3. **Logging:** Sends `tracing` output to stderr, filtered by `--log`, `RUST_LOG` or the configuration.
//!
//! A `ctl-error` (including malformed JSON on stdin) ends the process with status 2.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use ct_core::config::Config;
use ct_core::model::Calc;
use ct_core::scmd::builtins::vtor_noargs;
use ct_core::sim::{InstructionSource, JsonStreamSource};
use ct_core::{Command, CtError, EventKind, Notification, ScmdSpec, Simulation};

/// Exit status after a fatal control error.
const EXIT_CTL_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "ctc",
    author,
    version,
    about = "mdb-style control harness for simulation models",
    long_about = "Reads JSON command records from stdin, one per line, and prints notifications as JSON lines.\n\nExamples:\n  ctc calc\n  ctc --input program.json calc\n  echo '{\"scmd\":\"scmds\"}' | ctc"
)]
struct Cli {
    /// Configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter directive (e.g. `ct_core=debug`); overrides `RUST_LOG`.
    #[arg(long)]
    log: Option<String>,

    /// File of JSON instructions used when a model asks for the default input.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Model to attach at startup.
    model: Option<String>,

    /// Arguments for the model.
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ctc: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the stderr subscriber. `--log` wins over `RUST_LOG`, which wins
/// over the configured filter.
fn init_logging(flag: Option<&str>, fallback: &str) {
    let filter = flag.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        EnvFilter::new,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode, CtError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_logging(cli.log.as_deref(), &config.general.log_filter);

    let sim = Simulation::new(config);
    sim.register_model("calc", Calc::create)?;

    let quit = Rc::new(Cell::new(false));
    let flag = Rc::clone(&quit);
    sim.register_scmd(
        ScmdSpec::new("quit", move |_ctl, _cmd, responder| {
            flag.set(true);
            responder.done();
        })
        .aliases(["$q"])
        .validator(vtor_noargs)
        .synopsis("quit the harness"),
    )?;

    match cli.input {
        Some(path) => sim.set_default_input(move || {
            let source: Box<dyn InstructionSource> = Box::new(JsonStreamSource::open(&path)?);
            Ok(source)
        }),
        None => sim.set_default_input(|| {
            Err(CtError::ModelInit(
                "stdin carries control input; pass --input FILE".into(),
            ))
        }),
    }

    for kind in EventKind::ALL {
        let _ = sim.subscribe(kind, print_notification);
    }

    if let Some(model) = cli.model {
        let args = std::iter::once(model).chain(cli.args);
        sim.inject_ctl(&Command::new("attach").with_args(args))?;
        drain(&sim);
    }

    let input = spawn_reader();
    let mut backlog = VecDeque::new();
    let mut eof = false;
    loop {
        if sim.is_poisoned() || quit.get() {
            break;
        }
        let submitted = submit_next(&sim, &mut backlog);
        match sim.turn() {
            Ok(true) => {
                eof |= poll(&input, &mut backlog)?;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                debug!(%e, "simulation stopped processing");
                break;
            }
        }
        if submitted {
            continue;
        }
        if eof {
            break;
        }
        match input.recv() {
            Ok(line) => push_line(&mut backlog, line?),
            Err(_) => eof = true,
        }
    }

    if sim.is_poisoned() {
        return Ok(ExitCode::from(EXIT_CTL_ERROR));
    }
    Ok(ExitCode::SUCCESS)
}

fn drain(sim: &Simulation) {
    if let Err(e) = sim.run_until_idle() {
        debug!(%e, "simulation stopped processing");
    }
}

/// Reads stdin on its own thread so control input keeps arriving while the
/// queue is busy.
fn spawn_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    let _reader = thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Moves every line already read into `backlog`. Returns true at end of input.
fn poll(input: &Receiver<io::Result<String>>, backlog: &mut VecDeque<String>) -> io::Result<bool> {
    loop {
        match input.try_recv() {
            Ok(line) => push_line(backlog, line?),
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => return Ok(true),
        }
    }
}

fn push_line(backlog: &mut VecDeque<String>, line: String) {
    if !line.trim().is_empty() {
        backlog.push_back(line);
    }
}

/// Submits the oldest buffered line unless a command is still in flight.
/// Returns true if a line was consumed.
fn submit_next(sim: &Simulation, backlog: &mut VecDeque<String>) -> bool {
    let Some(line) = backlog.front() else {
        return false;
    };
    match sim.inject_ctl_json(line) {
        Err(CtError::CommandInFlight) => return false,
        Ok(()) => {}
        Err(e) => debug!(%e, "control input rejected"),
    }
    let _ = backlog.pop_front();
    true
}

fn print_notification(notification: &Notification) {
    let mut out = io::stdout().lock();
    match serde_json::to_string(notification) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
        Err(e) => warn!(%e, "cannot encode notification"),
    }
}
