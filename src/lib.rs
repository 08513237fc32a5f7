//! permcheck - a permission-scenario verifier
//!
//! This library provisions ephemeral actors and fixture data in a target
//! web application, runs declarative role-permission scenarios against
//! it, and guarantees teardown of everything it created.

pub mod cli;
pub mod commands;
pub mod common;
pub mod executor;
pub mod provision;
pub mod scenario;
pub mod target;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
pub use executor::{run_suite, RunResult, SuiteReport};
pub use scenario::Suite;
pub use target::{MemoryTarget, Session, Target};
