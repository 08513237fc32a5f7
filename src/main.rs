//! permcheck - role-permission verification for web UIs
//!
//! Provisions an ephemeral test identity inside a target application,
//! drives declarative scenarios against it through a browser driver, and
//! tears everything down afterwards.

use clap::Parser;
use permcheck::{cli, commands, common};

use commands::Commands;

#[derive(Parser)]
#[command(name = "permcheck", about = "Role-permission verification for web UIs")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    common::logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
