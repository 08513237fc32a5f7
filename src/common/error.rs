//! Error types for the permission verifier
//!
//! The taxonomy mirrors the propagation policy: provisioning failures are
//! fatal to the whole run, step-level failures are isolated to their
//! scenario, and cleanup problems are logged warnings rather than errors.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the verifier
#[derive(Error, Debug)]
pub enum Error {
    // === Provisioning Errors ===
    #[error("Provisioning failed: {0}. No scenarios were run")]
    Provisioning(String),

    #[error("Actor '{email}' already exists. Set on_duplicate = \"reuse\" to continue with the existing actor")]
    DuplicateActor { email: String },

    // === Target/Driver Errors ===
    #[error("Driver unreachable at {url}: {error}")]
    DriverConnection { url: String, error: String },

    #[error("Driver request '{endpoint}' failed: {message}")]
    DriverRequestFailed { endpoint: String, message: String },

    #[error("Remote procedure '{method}' failed: {message}")]
    RpcFailed { method: String, message: String },

    #[error("Authentication failed for '{email}': {reason}")]
    AuthenticationFailed { email: String, reason: String },

    #[error("Admin command exited with status {status}: {command}")]
    AdminCommandFailed { command: String, status: i32 },

    // === Step Errors ===
    #[error("Step {step} timed out after {waited_secs}s waiting for '{selector}'")]
    StepTimeout {
        step: usize,
        selector: String,
        waited_secs: u64,
    },

    #[error("Assertion failed: {0}")]
    Assertion(AssertionFailure),

    // === Fixture Errors ===
    #[error("Fixture '{name}' not found under '{dir}'")]
    FixtureNotFound { name: String, dir: String },

    // === Suite Errors ===
    #[error("Invalid suite file: {0}")]
    SuiteParse(String),

    #[error("Capability '{capability}' is checked in only one direction. Every gated affordance needs both an exists and an absent assertion")]
    UnpairedCapability { capability: String },

    // === Run Outcome ===
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a driver request failed error
    pub fn driver_request_failed(endpoint: &str, message: &str) -> Self {
        Self::DriverRequestFailed {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a remote procedure failed error
    pub fn rpc_failed(method: &str, message: &str) -> Self {
        Self::RpcFailed {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a step timeout error
    pub fn step_timeout(step: usize, selector: &str, waited_secs: u64) -> Self {
        Self::StepTimeout {
            step,
            selector: selector.to_string(),
            waited_secs,
        }
    }

    /// True for failures that end the current scenario but not the run
    pub fn is_scenario_local(&self) -> bool {
        matches!(self, Self::StepTimeout { .. } | Self::Assertion(_))
    }
}

/// Expected/actual context captured for a failed assertion
///
/// Preserved verbatim in the run result so the first failing step of a
/// scenario can always be diagnosed from the report alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    /// Zero-based index of the failing step within its scenario
    pub step_index: usize,
    /// Selector or locator the assertion targeted
    pub selector: String,
    /// What the scenario declared
    pub expected: String,
    /// What the target actually showed
    pub actual: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} on '{}': expected {}, got {}",
            self.step_index + 1,
            self.selector,
            self.expected,
            self.actual
        )
    }
}
