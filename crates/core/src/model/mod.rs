//! Simulation models.
//!
//! This module provides everything a model author needs:
//! 1. **Contract:** The `Model` trait and the `InsnCheck` injection verdict.
//! 2. **Completions:** `ExecCompletion` and `InitReply`, the asynchronous result handles.
//! 3. **Registry:** Name-to-factory lookup used by `attach`.
//! 4. **Calculator:** `Calc`, an accumulator machine used for demonstrations and tests.

/// Accumulator calculator model.
pub mod calc;

/// Completion handles.
pub mod completion;

/// Model factories.
pub mod registry;

/// The model trait.
pub mod traits;

pub use calc::Calc;
pub use completion::{ExecCompletion, InitReply};
pub use registry::{ModelFactory, ModelRegistry};
pub use traits::{InsnCheck, Model};
