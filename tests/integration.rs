//! End-to-end integration tests for the verifier
//!
//! These tests run whole suites against the in-memory target and verify
//! the properties the harness promises: positive/negative visibility
//! pairs, strict step ordering, per-scenario failure isolation,
//! guaranteed and idempotent cleanup, and the imported-statistics
//! scenarios.

use std::path::PathBuf;

use permcheck::common::Config;
use permcheck::executor::run_suite;
use permcheck::provision;
use permcheck::scenario::{check_visibility_pairs, Suite};
use permcheck::target::MemoryTarget;

/// Path to the checked-in fixture directory
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_suite(name: &str) -> Suite {
    Suite::from_path(&fixtures_dir().join(name)).expect("fixture suite parses")
}

/// A target preloaded with the fixture blobs the suites reference
fn fresh_target() -> MemoryTarget {
    MemoryTarget::new()
        .with_fixtures_dir(fixtures_dir())
        .with_fixture("nlu_big_import.json", &big_import_payload())
}

/// Build an import payload with exactly 943 examples, 56 intents, and
/// 3 entities
fn big_import_payload() -> String {
    let mut examples = Vec::with_capacity(943);
    let entities = ["name", "city", "date"];
    for i in 0..943 {
        let entity = entities[i % entities.len()];
        examples.push(serde_json::json!({
            "text": format!("training example number {}", i),
            "intent": format!("intent.{:02}", i % 56),
            "entities": [
                {"start": 0, "end": 8, "value": "training", "entity": entity}
            ]
        }));
    }
    serde_json::to_string(&serde_json::json!({
        "common_examples": examples,
        "entity_synonyms": [],
        "fuzzy_gazette": []
    }))
    .expect("payload serializes")
}

/// Config with a zero poll budget: probes once and never sleeps, so
/// deliberately failing scenarios do not stall the test run
fn instant_config() -> Config {
    Config::from_toml("[timeouts]\npoll_timeout_secs = 0\npoll_interval_ms = 1")
        .expect("config parses")
}

#[tokio::test]
async fn test_nlu_data_w_suite_passes_end_to_end() {
    let target = fresh_target();
    let suite = load_suite("nlu-data-w.yaml");
    let config = instant_config();

    let report = run_suite(&target, &suite, &config).await.expect("run completes");

    assert!(report.passed(), "failures: {:?}", report.results);
    assert_eq!(report.results.len(), 6);
    // every step of every scenario executed, in order
    for result in &report.results {
        assert_eq!(result.steps_run, result.steps_total);
    }

    // cleanup ran: the actor and both models are gone, teardown commands fired
    assert!(!target.user_exists("nludataw@test.ia").await);
    assert!(target.model_names().await.is_empty());
    assert_eq!(target.admin_log().await.len(), 2);
}

#[tokio::test]
async fn test_visibility_pairs_hold_across_role_suites() {
    let writer = load_suite("nlu-data-w.yaml");
    let trainer = load_suite("nlu-trainer.yaml");
    let no_access = load_suite("no-nlu-access.yaml");
    let suites = vec![writer, trainer, no_access];

    // every tagged capability is checked in both directions somewhere
    check_visibility_pairs(&suites).expect("pairing is complete");

    // the positive direction: an actor holding the capability sees it
    let target = fresh_target();
    let config = instant_config();
    let report = run_suite(&target, &suites[1], &config).await.expect("run completes");
    assert!(report.passed(), "failures: {:?}", report.results);

    // the negative direction: an actor lacking it does not
    let target = fresh_target();
    let report = run_suite(&target, &suites[2], &config).await.expect("run completes");
    assert!(report.passed(), "failures: {:?}", report.results);
}

#[tokio::test]
async fn test_missing_pair_is_rejected() {
    // the writer suite alone leaves nlu-data:x and nlu-model:w with no
    // positive direction
    let suites = vec![load_suite("nlu-data-w.yaml")];
    assert!(check_visibility_pairs(&suites).is_err());
}

#[tokio::test]
async fn test_scenario_failure_does_not_stop_later_scenarios() {
    let yaml = r#"
name: isolation
actor:
  email: isolated@test.ia
  permissions: ["nlu-data:w"]
project_fixture: bf_project_id.txt
models:
  - name: isolatedModel
    language: en
scenarios:
  - name: fails on a missing element
    steps:
      - action: navigate
        to: "/project/{project}/nlu/models"
      - action: click
        selector: "[data-cy=new-model]"
      - action: assert_exists
        selector: ".never-reached"
  - name: still runs afterwards
    steps:
      - action: navigate
        to: "/project/{project}/nlu/models"
      - action: click
        selector: ".cards > :first-child button.primary"
      - action: assert_exists
        selector: ".nlu-menu-training-data"
"#;
    let target = fresh_target();
    let suite = Suite::from_yaml(yaml).expect("suite parses");
    let config = instant_config();

    let report = run_suite(&target, &suite, &config).await.expect("run completes");

    assert!(!report.passed());
    assert_eq!(report.failed_count(), 1);

    let failed = &report.results[0];
    assert!(!failed.passed);
    // the click on the hidden new-model button timed out at step 2 and
    // the rest of the scenario never ran
    assert_eq!(failed.steps_run, 2);
    assert_eq!(failed.steps_total, 3);
    let failure = failed.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.index, 1);
    assert!(failure.message.contains("[data-cy=new-model]"));

    // the next scenario ran to completion on the same session
    let survivor = &report.results[1];
    assert!(survivor.passed);
    assert_eq!(survivor.steps_run, survivor.steps_total);

    // cleanup still ran despite the failure
    assert!(!target.user_exists("isolated@test.ia").await);
    assert!(target.model_names().await.is_empty());
}

#[tokio::test]
async fn test_failed_assertion_preserves_expected_and_actual() {
    let yaml = r#"
name: diagnosis
actor:
  email: diagnose@test.ia
  permissions: ["nlu-data:w"]
project_fixture: bf_project_id.txt
models:
  - name: statModel
    language: en
scenarios:
  - name: wrong statistics
    steps:
      - action: navigate
        to: "/project/{project}/nlu/models"
      - action: click
        selector: ".cards > :first-child button.primary"
      - action: assert_text
        selector: ".stat-examples .value"
        equals: "7"
"#;
    let target = fresh_target();
    let suite = Suite::from_yaml(yaml).expect("suite parses");
    let config = instant_config();

    let report = run_suite(&target, &suite, &config).await.expect("run completes");

    let failure = report.results[0].failure.as_ref().expect("failure recorded");
    assert_eq!(failure.index, 2);
    assert!(failure.message.contains("'7'"), "message: {}", failure.message);
    assert!(failure.message.contains("'0'"), "message: {}", failure.message);
}

#[tokio::test]
async fn test_provisioning_failure_aborts_before_scenarios() {
    // the project fixture is missing: provisioning must fail and no
    // scenario may run
    let yaml = r#"
name: broken provisioning
actor:
  email: broken@test.ia
  permissions: ["nlu-data:w"]
project_fixture: no_such_fixture.txt
scenarios:
  - name: never runs
    steps:
      - action: navigate
        to: "/project/{project}/nlu/models"
"#;
    let target = MemoryTarget::new();
    let suite = Suite::from_yaml(yaml).expect("suite parses");
    let config = instant_config();

    let result = run_suite(&target, &suite, &config).await;
    assert!(result.is_err());
    // nothing was persisted
    assert!(!target.user_exists("broken@test.ia").await);
}

#[tokio::test]
async fn test_cleanup_is_idempotent_after_a_full_run() {
    let target = fresh_target();
    let suite = load_suite("nlu-trainer.yaml");
    let config = instant_config();

    let mut ctx = provision::ProvisionedContext::new(suite.actor.clone());
    provision::provision(&target, &suite, &config, &mut ctx)
        .await
        .expect("provisioning succeeds");
    provision::cleanup(&target, &mut ctx, &suite, &config).await;

    assert!(!target.user_exists("nlutrainer@test.ia").await);
    let admin_calls = target.admin_log().await.len();

    // second call: warning-only no-op, no further admin commands
    provision::cleanup(&target, &mut ctx, &suite, &config).await;
    assert_eq!(target.admin_log().await.len(), admin_calls);
}
