//! Configuration system for the harness.
//!
//! This module defines the configuration structures used to parameterize a
//! simulation. It provides:
//! 1. **Defaults:** Baseline values for logging and engine behaviour.
//! 2. **Structures:** Hierarchical config for general, engine and initial breakpoint settings.
//! 3. **Loading:** JSON parsing from a string or a file.
//!
//! Configuration is supplied as JSON (`ctc --config FILE`) or use `Config::default()`.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::CtError;

/// Default configuration constants for the harness.
mod defaults {
    /// Log filter used when neither `--log` nor `RUST_LOG` is given.
    pub const LOG_FILTER: &str = "warn";

    /// Address assigned to the first instruction of a run.
    pub const START_ADDR: u64 = 0;

    /// Only produce `model-data` notifications while someone listens.
    pub const GATE_MODEL_DATA: bool = true;
}

/// Root configuration structure containing all harness settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use ct_core::config::Config;
///
/// let config = Config::default();
/// assert!(!config.general.trace_instructions);
/// assert_eq!(config.engine.start_addr, 0);
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use ct_core::config::Config;
///
/// let json = r#"{
///     "general": { "trace_instructions": true },
///     "engine": { "start_addr": 100 },
///     "breakpoints": [102, 105]
/// }"#;
///
/// let config = Config::from_json_str(json).unwrap();
/// assert!(config.general.trace_instructions);
/// assert_eq!(config.general.log_filter, "warn");
/// assert_eq!(config.engine.start_addr, 100);
/// assert_eq!(config.breakpoints, vec![102, 105]);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// General harness settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Execution engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Breakpoints inserted when the simulation is created
    #[serde(default)]
    pub breakpoints: Vec<u64>,
}

impl Config {
    /// Parses a configuration from JSON text.
    ///
    /// # Arguments
    ///
    /// * `json` - The configuration document.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or `CtError::Config` describing the problem.
    pub fn from_json_str(json: &str) -> Result<Self, CtError> {
        serde_json::from_str(json).map_err(|e| CtError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CtError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CtError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

/// General harness settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Log every executed instruction at info level
    #[serde(default)]
    pub trace_instructions: bool,

    /// Fallback `tracing` filter directive for the CLI
    #[serde(default = "GeneralConfig::default_log_filter")]
    pub log_filter: String,
}

impl GeneralConfig {
    fn default_log_filter() -> String {
        defaults::LOG_FILTER.to_string()
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            log_filter: Self::default_log_filter(),
        }
    }
}

/// Execution engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Address of the first instruction fetched by a run
    #[serde(default = "EngineConfig::default_start_addr")]
    pub start_addr: u64,

    /// Emit `model-data` only while at least one subscriber exists
    #[serde(default = "EngineConfig::default_gate_model_data")]
    pub gate_model_data: bool,
}

impl EngineConfig {
    const fn default_start_addr() -> u64 {
        defaults::START_ADDR
    }

    const fn default_gate_model_data() -> bool {
        defaults::GATE_MODEL_DATA
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_addr: Self::default_start_addr(),
            gate_model_data: Self::default_gate_model_data(),
        }
    }
}
