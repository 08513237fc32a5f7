//! CLI command handling
//!
//! Dispatches CLI commands to the verifier library and formats output.

use std::path::PathBuf;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::paths::default_fixtures_dir;
use crate::common::{Config, Error, Result};
use crate::executor::run_suite;
use crate::provision::force_cleanup;
use crate::scenario::{check_visibility_pairs, unpaired_capabilities, Suite};
use crate::target::{HttpTarget, MemoryTarget, Target};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            suites,
            driver,
            fixtures,
        } => {
            let config = load_config(fixtures)?;
            let target = build_target(&driver, &config)?;

            // parse everything first: the visibility pair for a capability
            // may live in a sibling role suite of the same invocation
            let parsed = suites
                .iter()
                .map(|path| Suite::from_path(path))
                .collect::<Result<Vec<_>>>()?;
            check_visibility_pairs(&parsed)?;

            let mut failed = 0;
            let mut total = 0;
            for suite in &parsed {
                let report = run_suite(target.as_ref(), suite, &config).await?;
                failed += report.failed_count();
                total += report.results.len();
            }

            if failed > 0 {
                return Err(Error::ScenariosFailed { failed, total });
            }
            Ok(())
        }

        Commands::Validate { suites } => {
            let mut broken = 0;
            let mut parsed = Vec::new();
            for path in &suites {
                match Suite::from_path(path) {
                    Ok(suite) => {
                        println!(
                            "{} {} ({} scenarios, {} steps)",
                            "✓".green(),
                            suite.name,
                            suite.scenarios.len(),
                            suite.step_count()
                        );
                        parsed.push(suite);
                    }
                    Err(e) => {
                        broken += 1;
                        println!("{} {}: {}", "✗".red(), path.display(), e);
                    }
                }
            }

            let unpaired = unpaired_capabilities(&parsed);
            for capability in &unpaired {
                println!(
                    "{} capability '{}' is checked in only one direction",
                    "✗".red(),
                    capability
                );
            }

            if broken > 0 {
                return Err(Error::Config(format!(
                    "{} of {} suites failed validation",
                    broken,
                    suites.len()
                )));
            }
            if let Some(capability) = unpaired.into_iter().next() {
                return Err(Error::UnpairedCapability { capability });
            }
            Ok(())
        }

        Commands::Cleanup {
            suites,
            driver,
            fixtures,
        } => {
            let config = load_config(fixtures)?;
            let target = build_target(&driver, &config)?;
            for path in &suites {
                let suite = Suite::from_path(path)?;
                println!("Cleaning up after '{}'", suite.name);
                force_cleanup(target.as_ref(), &suite, &config).await;
            }
            Ok(())
        }
    }
}

fn load_config(fixtures: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(dir) = fixtures {
        config.target.fixtures_dir = Some(dir);
    }
    Ok(config)
}

fn build_target(driver: &str, config: &Config) -> Result<Box<dyn Target>> {
    match driver {
        "http" => Ok(Box::new(HttpTarget::new(&config.target, &config.timeouts)?)),
        "memory" => {
            let dir = config
                .target
                .fixtures_dir
                .clone()
                .unwrap_or_else(default_fixtures_dir);
            Ok(Box::new(MemoryTarget::new().with_fixtures_dir(dir)))
        }
        other => Err(Error::Config(format!(
            "Unknown driver '{}'. Supported drivers: 'http', 'memory'",
            other
        ))),
    }
}
