//! Common types used throughout the harness.
//!
//! This module provides building blocks shared by every component:
//! 1. **Error Handling:** The crate-wide `CtError` and its wire form `ErrorBody`.
//! 2. **Addresses:** Parsing of operator-supplied instruction addresses.

/// Instruction address parsing.
pub mod addr;

/// Error types.
pub mod error;

pub use addr::parse_addr;
pub use error::{CtError, ErrorBody};
