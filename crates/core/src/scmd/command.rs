//! Command and response records.
//!
//! These are the wire shapes of the control channel. A command is
//! `{ "scmd", "addr"?, "args"?, "tag"? }` with no other properties; a
//! response stream is zero or more partial responses followed by exactly
//! one terminal response carrying `err` or `done: true`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{CtError, ErrorBody};

/// A control request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
    /// Command name or alias.
    pub scmd: String,
    /// Address operand (`addr::scmd`), if any.
    #[serde(default)]
    pub addr: Option<String>,
    /// Arguments, if any.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Correlation tag echoed back in every response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Command {
    /// Creates a command with no address, arguments or tag.
    pub fn new(scmd: impl Into<String>) -> Self {
        Self {
            scmd: scmd.into(),
            ..Self::default()
        }
    }

    /// Sets the address operand.
    #[must_use]
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Sets the arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the correlation tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Decodes and schema-checks a raw command record.
    ///
    /// # Returns
    ///
    /// `CtError::MalformedScmd` if the record has unknown properties, wrong
    /// types, or empty strings where non-empty ones are required.
    pub fn from_value(raw: Value) -> Result<Self, CtError> {
        if raw.get("tag").is_some_and(Value::is_null) {
            return Err(CtError::MalformedScmd);
        }
        let cmd: Self = serde_json::from_value(raw).map_err(|_| CtError::MalformedScmd)?;
        cmd.check()?;
        Ok(cmd)
    }

    fn check(&self) -> Result<(), CtError> {
        let empty_addr = self.addr.as_deref().is_some_and(str::is_empty);
        let empty_tag = self.tag.as_deref().is_some_and(str::is_empty);
        let empty_arg = self.args().iter().any(String::is_empty);
        if self.scmd.is_empty() || empty_addr || empty_tag || empty_arg {
            return Err(CtError::MalformedScmd);
        }
        Ok(())
    }

    /// Arguments, empty if none were given.
    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or_default()
    }
}

/// One response record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Set on a failed terminal response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorBody>,
    /// Lines for the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
    /// Structured results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    /// Set on a successful terminal response.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
    /// Tag of the command this responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl CommandResponse {
    /// An empty successful terminal response.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }

    /// A failed terminal response.
    pub fn error(err: &CtError) -> Self {
        Self {
            err: Some(err.body()),
            ..Self::default()
        }
    }

    /// A response carrying operator messages.
    pub fn messages<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: Some(lines.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Adds structured data.
    #[must_use]
    pub fn with_data(mut self, data: Vec<Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns true if this response ends its command's stream.
    pub const fn is_terminal(&self) -> bool {
        self.done || self.err.is_some()
    }
}
