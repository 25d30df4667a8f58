//! Instruction sources.
//!
//! This module defines where instructions come from. It provides:
//! 1. **Contract:** `InstructionSource`, an ordered pull-based stream with end and error signalling.
//! 2. **In-memory:** `VecSource` for programmatic runs and tests.
//! 3. **JSON stream:** `JsonStreamSource`, line-oriented JSON read from any `BufRead`.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::common::CtError;

/// An ordered producer of instruction records.
///
/// The engine consumes a source destructively and never rewinds it.
pub trait InstructionSource {
    /// Produces the next instruction.
    ///
    /// # Returns
    ///
    /// `Ok(Some(insn))` for an instruction, `Ok(None)` at end of input, or an
    /// error if the input is malformed.
    fn next_insn(&mut self) -> Result<Option<Value>, CtError>;
}

impl fmt::Debug for dyn InstructionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InstructionSource")
    }
}

/// Instructions held in memory.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    insns: VecDeque<Value>,
}

impl VecSource {
    /// Creates a source yielding `insns` in order.
    pub fn new(insns: impl IntoIterator<Item = Value>) -> Self {
        Self {
            insns: insns.into_iter().collect(),
        }
    }

    /// Number of instructions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.insns.len()
    }
}

impl InstructionSource for VecSource {
    fn next_insn(&mut self) -> Result<Option<Value>, CtError> {
        Ok(self.insns.pop_front())
    }
}

/// JSON values read line by line from a reader.
///
/// Blank lines are skipped. A value may span several lines; lines accumulate
/// until they parse. Text left over at end of input is an error.
pub struct JsonStreamSource<R> {
    reader: R,
    accum: String,
    line: String,
    line_no: usize,
}

impl<R: BufRead> JsonStreamSource<R> {
    /// Wraps a buffered reader.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            accum: String::new(),
            line: String::new(),
            line_no: 0,
        }
    }
}

impl JsonStreamSource<BufReader<File>> {
    /// Opens a file of JSON instructions.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CtError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> InstructionSource for JsonStreamSource<R> {
    fn next_insn(&mut self) -> Result<Option<Value>, CtError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                let rest = std::mem::take(&mut self.accum);
                if rest.trim().is_empty() {
                    return Ok(None);
                }
                return serde_json::from_str(&rest)
                    .map(Some)
                    .map_err(|e| CtError::Source(format!("line {}: {e}", self.line_no)));
            }
            self.line_no += 1;

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            if !self.accum.is_empty() {
                self.accum.push('\n');
            }
            self.accum.push_str(line);

            match serde_json::from_str::<Value>(&self.accum) {
                Ok(value) => {
                    self.accum.clear();
                    return Ok(Some(value));
                }
                Err(e) if e.is_eof() => {}
                Err(e) => {
                    return Err(CtError::Source(format!("line {}: {e}", self.line_no)));
                }
            }
        }
    }
}

impl<R> fmt::Debug for JsonStreamSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStreamSource")
            .field("line_no", &self.line_no)
            .field("buffered", &self.accum.len())
            .finish_non_exhaustive()
    }
}
