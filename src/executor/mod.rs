//! Scenario execution
//!
//! A sequential step interpreter over parsed suites. One authenticated
//! session is established per run and threaded through every step;
//! scenarios execute strictly in declaration order and a failure in one
//! never prevents the next from running.

mod report;
mod runner;

pub use report::{RunResult, StepFailure, SuiteReport};
pub use runner::run_suite;
