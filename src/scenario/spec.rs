//! Suite configuration types
//!
//! Defines the data structures for deserializing YAML suites.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::common::{Error, Result};

/// A complete verification suite loaded from a YAML file
///
/// One suite owns one actor: every scenario in it runs under the same
/// provisioned identity and shares one authenticated session.
#[derive(Deserialize, Debug)]
pub struct Suite {
    /// Name of the suite
    pub name: String,
    /// Optional description of the permission surface under verification
    pub description: Option<String>,
    /// Identity to provision before scenarios run
    pub actor: ActorSpec,
    /// Fixture whose content is the owning project id
    pub project_fixture: Option<String>,
    /// Fixture blobs to inject during provisioning
    #[serde(default)]
    pub fixtures: Vec<String>,
    /// Models to create through the remote-procedure path
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    /// Admin commands run as the last cleanup stage
    #[serde(default)]
    pub teardown: Vec<TeardownStep>,
    /// The scenarios, executed strictly in declaration order
    pub scenarios: Vec<Scenario>,
}

/// Identity provisioned for one suite run
#[derive(Deserialize, Debug, Clone)]
pub struct ActorSpec {
    /// Email identifying the actor in the target system
    pub email: String,
    /// Capability tokens granted to the actor, in declaration order
    pub permissions: Vec<String>,
    /// Password for UI authentication; omitted for token-minting targets
    pub password: Option<String>,
}

/// A model record created during provisioning
#[derive(Deserialize, Debug, Clone)]
pub struct ModelSpec {
    /// Name the model is created (and later removed) under
    pub name: String,
    /// Language code, e.g. "en"
    pub language: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Fixture to import into the model right after creation
    pub import: Option<String>,
}

/// One admin command executed during teardown
#[derive(Deserialize, Debug, Clone)]
pub struct TeardownStep {
    /// Raw command against the target's datastore, the one place the
    /// design intentionally bypasses the application API
    pub admin: String,
}

/// A named ordered sequence of steps encoding one behavioral expectation
#[derive(Deserialize, Debug)]
pub struct Scenario {
    /// Human-readable title used in reporting
    pub name: String,
    /// Steps, executed strictly in order
    pub steps: Vec<Step>,
}

/// A single step: an action against the target or a pure assertion
///
/// Locators, selectors, typed text, and RPC arguments may contain
/// `{project}` and `{model.NAME}` placeholders, resolved from the
/// provisioned context at execution time.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Move the session to an addressable location
    Navigate {
        /// Location relative to the target's base URL
        to: String,
    },
    /// Click a located element, waiting for it to appear first
    Click {
        selector: String,
    },
    /// Type text into a located element
    Type {
        selector: String,
        text: String,
    },
    /// Upload a fixture's content to a located element
    Upload {
        selector: String,
        /// Named fixture whose content becomes the uploaded file
        fixture: String,
    },
    /// Call the target's server-side API, bypassing the UI
    Rpc {
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Expect an element to be present within the bounded wait
    AssertExists {
        selector: String,
        /// Capability token gating this affordance, for pairing checks
        capability: Option<String>,
    },
    /// Expect an element to stay absent within the bounded wait
    AssertAbsent {
        selector: String,
        /// Capability token gating this affordance, for pairing checks
        capability: Option<String>,
    },
    /// Expect an element's text to match
    AssertText {
        selector: String,
        /// Exact expected text
        equals: Option<String>,
        /// Expected substring
        contains: Option<String>,
    },
}

impl Step {
    /// True for pure checks that never mutate target state
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Step::AssertExists { .. } | Step::AssertAbsent { .. } | Step::AssertText { .. }
        )
    }

    /// Short label for step reporting
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { to } => format!("navigate {}", to),
            Step::Click { selector } => format!("click {}", selector),
            Step::Type { selector, .. } => format!("type into {}", selector),
            Step::Upload { selector, fixture } => {
                format!("upload {} to {}", fixture, selector)
            }
            Step::Rpc { method, .. } => format!("rpc {}", method),
            Step::AssertExists { selector, .. } => format!("expect {}", selector),
            Step::AssertAbsent { selector, .. } => format!("expect no {}", selector),
            Step::AssertText { selector, .. } => format!("expect text at {}", selector),
        }
    }
}

impl Suite {
    /// Load and parse a suite from a YAML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a suite from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::SuiteParse(e.to_string()))
    }

    /// Total number of steps across all scenarios
    pub fn step_count(&self) -> usize {
        self.scenarios.iter().map(|s| s.steps.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name: "nlu-data:w role permissions"
actor:
  email: nludataw@test.ia
  permissions: ["nlu-data:w"]
project_fixture: bf_project_id.txt
fixtures:
  - nlu_import.json
models:
  - name: deleteModel
    language: en
teardown:
  - admin: "mongo meteor --host localhost:3001 --eval \"db.nlu_models.remove({ name: 'deleteModel'});\""
scenarios:
  - name: model tabs reachable
    steps:
      - action: navigate
        to: "/project/{project}/nlu/models"
      - action: click
        selector: ".cards > :first-child button.primary"
      - action: assert_exists
        selector: ".nlu-menu-activity"
        capability: "nlu-data:r"
      - action: assert_absent
        selector: "[data-cy=train-button]"
        capability: "nlu-data:x"
      - action: assert_text
        selector: ".stat-examples .value"
        equals: "943"
"#;

    #[test]
    fn test_parse_suite() {
        let suite = Suite::from_yaml(SUITE).unwrap();
        assert_eq!(suite.name, "nlu-data:w role permissions");
        assert_eq!(suite.actor.permissions, vec!["nlu-data:w"]);
        assert_eq!(suite.models.len(), 1);
        assert_eq!(suite.teardown.len(), 1);
        assert_eq!(suite.scenarios.len(), 1);
        assert_eq!(suite.step_count(), 5);
    }

    #[test]
    fn test_step_variants() {
        let suite = Suite::from_yaml(SUITE).unwrap();
        let steps = &suite.scenarios[0].steps;
        assert!(matches!(steps[0], Step::Navigate { .. }));
        assert!(!steps[1].is_assertion());
        assert!(steps[2].is_assertion());
        match &steps[3] {
            Step::AssertAbsent { capability, .. } => {
                assert_eq!(capability.as_deref(), Some("nlu-data:x"));
            }
            other => panic!("expected assert_absent, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let bad = r#"
name: bad
actor:
  email: a@b.c
  permissions: []
scenarios:
  - name: s
    steps:
      - action: hover
        selector: ".x"
"#;
        assert!(matches!(
            Suite::from_yaml(bad),
            Err(Error::SuiteParse(_))
        ));
    }

    #[test]
    fn test_optional_sections_default_empty() {
        let minimal = r#"
name: minimal
actor:
  email: a@b.c
  permissions: ["thing:r"]
scenarios: []
"#;
        let suite = Suite::from_yaml(minimal).unwrap();
        assert!(suite.fixtures.is_empty());
        assert!(suite.models.is_empty());
        assert!(suite.teardown.is_empty());
        assert!(suite.project_fixture.is_none());
    }
}
