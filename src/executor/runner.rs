//! Suite runner
//!
//! Orchestrates one run: provision, authenticate, execute every
//! scenario, then guaranteed cleanup. Existence and absence checks use a
//! bounded poll rather than fixed delays because the target renders
//! asynchronously; the bound is one configuration constant shared by all
//! assertions.

use std::time::Duration;

use colored::Colorize;
use serde_json::Value;
use tokio::time::Instant;

use crate::common::config::Timeouts;
use crate::common::{AssertionFailure, Config, Error, Result};
use crate::provision::{cleanup, provision, ProvisionedContext};
use crate::scenario::{Scenario, Step, Suite};
use crate::target::{Interaction, Session, Target};

use super::report::{RunResult, StepFailure, SuiteReport};

/// Run a whole suite against a target
///
/// Provisioning failures abort before any scenario executes; scenario
/// failures are collected per scenario; cleanup runs on every path that
/// got past provisioning, including authentication failure. Visibility
/// pairing is a property of the whole invocation's suite set and is
/// checked by the caller before any suite runs.
pub async fn run_suite(
    target: &dyn Target,
    suite: &Suite,
    config: &Config,
) -> Result<SuiteReport> {
    println!(
        "\n{} {}",
        "Running Suite:".blue().bold(),
        suite.name.white().bold()
    );
    if let Some(desc) = &suite.description {
        println!("  {}", desc.dimmed());
    }

    let mut ctx = ProvisionedContext::new(suite.actor.clone());
    let outcome = match provision(target, suite, config, &mut ctx).await {
        Ok(()) => match target.authenticate(&suite.actor).await {
            Ok(session) => Ok(run_scenarios(target, suite, &ctx, &session, config).await),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    // guaranteed teardown: every path past this point went through it
    cleanup(target, &mut ctx, suite, config).await;

    let results = outcome?;
    let report = SuiteReport {
        suite: suite.name.clone(),
        results,
    };
    report.print_summary();
    Ok(report)
}

/// Execute scenarios strictly in declaration order over one shared session
async fn run_scenarios(
    target: &dyn Target,
    suite: &Suite,
    ctx: &ProvisionedContext,
    session: &Session,
    config: &Config,
) -> Vec<RunResult> {
    let mut results = Vec::with_capacity(suite.scenarios.len());
    for scenario in &suite.scenarios {
        results.push(run_scenario(target, scenario, ctx, session, config).await);
    }
    results
}

async fn run_scenario(
    target: &dyn Target,
    scenario: &Scenario,
    ctx: &ProvisionedContext,
    session: &Session,
    config: &Config,
) -> RunResult {
    println!("\n{}", format!("Scenario: {}", scenario.name).cyan());

    let steps_total = scenario.steps.len();
    let mut steps_run = 0;
    let mut failure = None;

    for (i, step) in scenario.steps.iter().enumerate() {
        steps_run = i + 1;
        match execute_step(target, ctx, session, config, i, step).await {
            Ok(()) => {
                println!(
                    "  {} Step {}: {}",
                    "✓".green(),
                    i + 1,
                    step.describe().dimmed()
                );
            }
            Err(e) => {
                println!("  {} Step {}: {}", "✗".red(), i + 1, e);
                if !e.is_scenario_local() {
                    tracing::warn!(
                        scenario = %scenario.name,
                        error = %e,
                        "step failed outside the timeout/assertion taxonomy"
                    );
                }
                failure = Some(StepFailure {
                    index: i,
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    RunResult {
        name: scenario.name.clone(),
        passed: failure.is_none(),
        steps_run,
        steps_total,
        failure,
    }
}

/// Execute a single step
async fn execute_step(
    target: &dyn Target,
    ctx: &ProvisionedContext,
    session: &Session,
    config: &Config,
    index: usize,
    step: &Step,
) -> Result<()> {
    let timeouts = &config.timeouts;
    match step {
        Step::Navigate { to } => target.navigate(session, &ctx.expand(to)).await,

        Step::Click { selector } => {
            let selector = ctx.expand(selector);
            require_element(target, session, &selector, index, timeouts).await?;
            target.interact(session, &selector, Interaction::Click).await
        }

        Step::Type { selector, text } => {
            let selector = ctx.expand(selector);
            require_element(target, session, &selector, index, timeouts).await?;
            target
                .interact(
                    session,
                    &selector,
                    Interaction::Type {
                        text: ctx.expand(text),
                    },
                )
                .await
        }

        Step::Upload { selector, fixture } => {
            let content = match ctx.fixture(fixture) {
                Some(content) => content.to_string(),
                None => target.load_fixture(fixture).await?,
            };
            let selector = ctx.expand(selector);
            require_element(target, session, &selector, index, timeouts).await?;
            target
                .interact(
                    session,
                    &selector,
                    Interaction::Upload {
                        file_name: fixture.clone(),
                        content,
                    },
                )
                .await
        }

        Step::Rpc { method, args } => {
            let args: Vec<Value> = args.iter().map(|v| ctx.expand_value(v)).collect();
            target
                .invoke_remote_procedure(method, &args)
                .await
                .map(|_| ())
        }

        Step::AssertExists { selector, .. } => {
            let selector = ctx.expand(selector);
            if wait_for_presence(target, session, &selector, timeouts, true).await? {
                Ok(())
            } else {
                Err(Error::Assertion(AssertionFailure {
                    step_index: index,
                    selector,
                    expected: "present".to_string(),
                    actual: format!("absent after {}s", timeouts.poll_timeout_secs),
                }))
            }
        }

        Step::AssertAbsent { selector, .. } => {
            let selector = ctx.expand(selector);
            if wait_for_presence(target, session, &selector, timeouts, false).await? {
                Ok(())
            } else {
                Err(Error::Assertion(AssertionFailure {
                    step_index: index,
                    selector,
                    expected: "absent".to_string(),
                    actual: format!("still present after {}s", timeouts.poll_timeout_secs),
                }))
            }
        }

        Step::AssertText {
            selector,
            equals,
            contains,
        } => {
            let selector = ctx.expand(selector);
            assert_text(
                target, session, &selector, equals.as_deref(), contains.as_deref(),
                index, timeouts,
            )
            .await
        }
    }
}

/// Wait for an action's target element; absence at the deadline is a
/// step timeout, not an assertion failure
async fn require_element(
    target: &dyn Target,
    session: &Session,
    selector: &str,
    index: usize,
    timeouts: &Timeouts,
) -> Result<()> {
    if wait_for_presence(target, session, selector, timeouts, true).await? {
        Ok(())
    } else {
        Err(Error::step_timeout(
            index + 1,
            selector,
            timeouts.poll_timeout_secs,
        ))
    }
}

/// Poll until the element's presence matches `want_present` or the
/// bounded wait elapses. Probe errors propagate immediately.
async fn wait_for_presence(
    target: &dyn Target,
    session: &Session,
    selector: &str,
    timeouts: &Timeouts,
    want_present: bool,
) -> Result<bool> {
    let deadline = Instant::now() + Duration::from_secs(timeouts.poll_timeout_secs);
    let interval = Duration::from_millis(timeouts.poll_interval_ms);
    loop {
        if target.query_existence(session, selector).await? == want_present {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Poll the element's text until it matches the expectation
async fn assert_text(
    target: &dyn Target,
    session: &Session,
    selector: &str,
    equals: Option<&str>,
    contains: Option<&str>,
    index: usize,
    timeouts: &Timeouts,
) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(timeouts.poll_timeout_secs);
    let interval = Duration::from_millis(timeouts.poll_interval_ms);

    let matches = |text: &str| {
        let exact_ok = equals.map(|e| text.trim() == e.trim()).unwrap_or(true);
        let substr_ok = contains.map(|c| text.contains(c)).unwrap_or(true);
        exact_ok && substr_ok
    };

    let mut last: Option<String>;
    loop {
        last = target.query_text(session, selector).await?;
        if let Some(text) = &last {
            if matches(text) {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    let expected = match (equals, contains) {
        (Some(e), _) => format!("text '{}'", e),
        (None, Some(c)) => format!("text containing '{}'", c),
        (None, None) => "any text".to_string(),
    };
    let actual = match last {
        Some(text) => format!("'{}'", text),
        None => "element absent".to_string(),
    };
    Err(Error::Assertion(AssertionFailure {
        step_index: index,
        selector: selector.to_string(),
        expected,
        actual,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ActorSpec;
    use crate::target::MemoryTarget;
    use serde_json::json;

    fn instant_config() -> Config {
        // zero poll budget: probes exactly once, never sleeps
        Config::from_toml("[timeouts]\npoll_timeout_secs = 0\npoll_interval_ms = 1").unwrap()
    }

    async fn session_on_model_list(target: &MemoryTarget) -> Session {
        target
            .invoke_remote_procedure(
                "users.create",
                &[json!("w@test.ia"), json!(["nlu-data:w"]), json!("p1")],
            )
            .await
            .unwrap();
        target
            .invoke_remote_procedure("nlu.insert", &[json!({"name": "m", "language": "en"})])
            .await
            .unwrap();
        let actor = ActorSpec {
            email: "w@test.ia".to_string(),
            permissions: vec!["nlu-data:w".to_string()],
            password: None,
        };
        let session = target.authenticate(&actor).await.unwrap();
        target
            .navigate(&session, "/project/p1/nlu/models")
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_wait_for_presence_finds_existing_element() {
        let target = MemoryTarget::new();
        let session = session_on_model_list(&target).await;
        let config = instant_config();
        let found = wait_for_presence(
            &target,
            &session,
            ".cards > :first-child button.primary",
            &config.timeouts,
            true,
        )
        .await
        .unwrap();
        assert!(found);
    }

    #[tokio::test]
    async fn test_wait_for_presence_reports_absence_at_deadline() {
        let target = MemoryTarget::new();
        let session = session_on_model_list(&target).await;
        let config = instant_config();
        let found = wait_for_presence(
            &target,
            &session,
            "[data-cy=train-button]",
            &config.timeouts,
            true,
        )
        .await
        .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_click_on_missing_element_is_step_timeout() {
        let target = MemoryTarget::new();
        let session = session_on_model_list(&target).await;
        let config = instant_config();
        let ctx = ProvisionedContext::new(ActorSpec {
            email: "w@test.ia".to_string(),
            permissions: vec!["nlu-data:w".to_string()],
            password: None,
        });
        let step = Step::Click {
            selector: "[data-cy=new-model]".to_string(),
        };
        let result = execute_step(&target, &ctx, &session, &config, 0, &step).await;
        assert!(matches!(result, Err(Error::StepTimeout { .. })));
    }

    #[tokio::test]
    async fn test_failed_existence_assertion_carries_context() {
        let target = MemoryTarget::new();
        let session = session_on_model_list(&target).await;
        let config = instant_config();
        let ctx = ProvisionedContext::new(ActorSpec {
            email: "w@test.ia".to_string(),
            permissions: vec![],
            password: None,
        });
        let step = Step::AssertExists {
            selector: "[data-cy=train-button]".to_string(),
            capability: None,
        };
        match execute_step(&target, &ctx, &session, &config, 4, &step).await {
            Err(Error::Assertion(failure)) => {
                assert_eq!(failure.step_index, 4);
                assert_eq!(failure.selector, "[data-cy=train-button]");
                assert_eq!(failure.expected, "present");
            }
            other => panic!("expected assertion failure, got {:?}", other),
        }
    }
}
