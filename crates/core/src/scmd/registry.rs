//! Command registry.
//!
//! Maps command names and aliases to handler descriptors. Names are global
//! and case-sensitive; a registration whose name or any alias is already
//! taken is rejected as a whole.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::command::Command;
use super::responder::Responder;
use crate::common::CtError;
use crate::sim::controller::Controller;

/// Command handler.
///
/// Handlers receive the controller, the validated command and a responder
/// that must eventually be finished.
pub type ScmdHandler = Rc<dyn Fn(&mut Controller, &Command, Responder)>;

/// Command validator. An `Err` becomes a usage error and the handler is not
/// called.
pub type ScmdValidator = Rc<dyn Fn(&Command) -> Result<(), String>>;

const NO_SYNOPSIS: &str = "no synopsis available";

/// Description of a command to register.
///
/// # Examples
///
/// ```
/// use ct_core::scmd::{CommandResponse, ScmdSpec};
///
/// let spec = ScmdSpec::new("hello", |_ctl, _cmd, responder| {
///     responder.finish(CommandResponse::messages(["hello"]));
/// })
/// .aliases([":h"])
/// .synopsis("say hello");
/// assert_eq!(spec.name(), "hello");
/// ```
#[derive(Clone)]
pub struct ScmdSpec {
    name: String,
    aliases: Vec<String>,
    handler: ScmdHandler,
    validator: Option<ScmdValidator>,
    synopsis: Option<String>,
    hidden: bool,
}

impl ScmdSpec {
    /// Describes command `name` handled by `handler`.
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&mut Controller, &Command, Responder) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            handler: Rc::new(handler),
            validator: None,
            synopsis: None,
            hidden: false,
        }
    }

    /// Adds alternative names.
    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Installs a validator that runs before the handler.
    #[must_use]
    pub fn validator(mut self, validator: impl Fn(&Command) -> Result<(), String> + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Sets the one-line description shown by `scmds`.
    #[must_use]
    pub fn synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = Some(synopsis.into());
        self
    }

    /// Omits the command from `scmds`.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Primary name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ScmdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScmdSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

/// A registered command.
pub(crate) struct ScmdEntry {
    pub(crate) name: String,
    pub(crate) handler: ScmdHandler,
    pub(crate) validator: Option<ScmdValidator>,
    pub(crate) synopsis: String,
    pub(crate) hidden: bool,
}

/// Name and alias lookup table.
#[derive(Clone, Default)]
pub struct ScmdRegistry {
    entries: BTreeMap<String, Rc<ScmdEntry>>,
}

impl ScmdRegistry {
    /// Registers `spec` under its name and aliases.
    ///
    /// # Returns
    ///
    /// `CtError::AlreadyRegistered` naming the first colliding name; nothing
    /// is registered in that case.
    pub fn register(&mut self, spec: ScmdSpec) -> Result<(), CtError> {
        let mut names: Vec<String> = Vec::with_capacity(1 + spec.aliases.len());
        names.push(spec.name.clone());
        names.extend(spec.aliases.iter().cloned());

        for (i, name) in names.iter().enumerate() {
            if self.entries.contains_key(name) || names[..i].contains(name) {
                return Err(CtError::AlreadyRegistered(name.clone()));
            }
        }

        let entry = Rc::new(ScmdEntry {
            name: spec.name,
            handler: spec.handler,
            validator: spec.validator,
            synopsis: spec.synopsis.unwrap_or_else(|| NO_SYNOPSIS.to_string()),
            hidden: spec.hidden,
        });
        for name in names {
            let _ = self.entries.insert(name, Rc::clone(&entry));
        }
        Ok(())
    }

    /// Removes the command registered under primary name `name`, aliases
    /// included.
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(entry) = self.entries.get(name).cloned() else {
            return false;
        };
        if entry.name != name {
            return false;
        }
        self.entries.retain(|_, e| !Rc::ptr_eq(e, &entry));
        true
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Rc<ScmdEntry>> {
        self.entries.get(name).cloned()
    }

    /// Visible commands in alphabetical order, formatted for `scmds`.
    pub fn listing(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, e)| !e.hidden && **key == e.name)
            .map(|(key, e)| format!("{key}\t\t- {}", e.synopsis))
            .collect()
    }
}

impl fmt::Debug for ScmdRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
