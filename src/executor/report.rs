//! Run results and summary reporting

use colored::Colorize;

/// Outcome of one scenario
#[derive(Debug)]
pub struct RunResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    /// First failing step, when the scenario did not pass
    pub failure: Option<StepFailure>,
}

/// Context of the first failing step, preserved for diagnosis
#[derive(Debug)]
pub struct StepFailure {
    /// Zero-based index of the step within its scenario
    pub index: usize,
    /// Rendered failure, including selector and expected/actual where known
    pub message: String,
}

/// All scenario outcomes for one suite run
#[derive(Debug)]
pub struct SuiteReport {
    pub suite: String,
    pub results: Vec<RunResult>,
}

impl SuiteReport {
    /// True when every scenario passed
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Number of failed scenarios
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Print the aggregate verdict
    pub fn print_summary(&self) {
        println!();
        for result in &self.results {
            if result.passed {
                println!(
                    "  {} {} ({}/{} steps)",
                    "✓".green(),
                    result.name,
                    result.steps_run,
                    result.steps_total
                );
            } else {
                println!(
                    "  {} {} ({}/{} steps)",
                    "✗".red(),
                    result.name,
                    result.steps_run,
                    result.steps_total
                );
                if let Some(failure) = &result.failure {
                    println!("      {}", failure.message.dimmed());
                }
            }
        }
        let failed = self.failed_count();
        if failed == 0 {
            println!(
                "\n{} {}\n",
                "✓".green().bold(),
                format!("{}: all {} scenarios passed", self.suite, self.results.len())
                    .green()
                    .bold()
            );
        } else {
            println!(
                "\n{} {}\n",
                "✗".red().bold(),
                format!(
                    "{}: {} of {} scenarios failed",
                    self.suite,
                    failed,
                    self.results.len()
                )
                .red()
                .bold()
            );
        }
    }
}
