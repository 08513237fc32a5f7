//! CLI command definitions
//!
//! Defines the clap commands for the verifier CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more suites against the target
    Run {
        /// Paths to suite YAML files, executed in order
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// Driver backend: "http" (default) or "memory"
        #[arg(long, default_value = "http")]
        driver: String,

        /// Override the fixtures directory from configuration
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },

    /// Parse suites and check visibility pairing without touching a target
    Validate {
        /// Paths to suite YAML files
        #[arg(required = true)]
        suites: Vec<PathBuf>,
    },

    /// Re-run teardown for suites whose run was interrupted
    Cleanup {
        /// Paths to suite YAML files
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// Driver backend: "http" (default) or "memory"
        #[arg(long, default_value = "http")]
        driver: String,

        /// Override the fixtures directory from configuration
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
}
