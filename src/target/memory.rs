//! In-memory target
//!
//! A hermetic fake of a permission-gated NLU workbench, complete enough
//! to run whole suites without a live application or driver bridge.
//! Affordance visibility is computed purely from the session actor's
//! permission set and the current view, which is exactly the property
//! the verifier exists to check.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::common::{Error, Result};
use crate::scenario::ActorSpec;

use super::{Interaction, Session, Target};

/// A provisioned user account
struct UserRecord {
    permissions: Vec<String>,
}

/// An NLU model with its training-data statistics
#[derive(Default)]
struct ModelRecord {
    name: String,
    examples: usize,
    intents: BTreeSet<String>,
    entities: BTreeSet<String>,
}

/// Per-session browser view: where the session is and what it has open
struct ViewState {
    email: String,
    location: String,
    open_model: Option<String>,
    pending_input: Option<String>,
}

#[derive(Default)]
struct AppState {
    users: HashMap<String, UserRecord>,
    models: BTreeMap<String, ModelRecord>,
    sessions: HashMap<String, ViewState>,
    admin_log: Vec<String>,
    next_id: u64,
}

/// Hermetic in-process target used by integration tests and by runs with
/// `--driver memory`
pub struct MemoryTarget {
    state: Mutex<AppState>,
    fixtures: HashMap<String, String>,
    fixtures_dir: Option<PathBuf>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState::default()),
            fixtures: HashMap::new(),
            fixtures_dir: None,
        }
    }

    /// Register an in-memory fixture blob
    pub fn with_fixture(mut self, name: &str, content: &str) -> Self {
        self.fixtures.insert(name.to_string(), content.to_string());
        self
    }

    /// Fall back to a directory on disk for fixtures not registered
    pub fn with_fixtures_dir(mut self, dir: PathBuf) -> Self {
        self.fixtures_dir = Some(dir);
        self
    }

    /// Whether a user account currently exists
    pub async fn user_exists(&self, email: &str) -> bool {
        self.state.lock().await.users.contains_key(email)
    }

    /// Names of all models currently stored
    pub async fn model_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.models.values().map(|m| m.name.clone()).collect()
    }

    /// (examples, intents, entities) for a model, by name
    pub async fn model_stats(&self, name: &str) -> Option<(usize, usize, usize)> {
        let state = self.state.lock().await;
        state
            .models
            .values()
            .find(|m| m.name == name)
            .map(|m| (m.examples, m.intents.len(), m.entities.len()))
    }

    /// Admin commands executed so far, in order
    pub async fn admin_log(&self) -> Vec<String> {
        self.state.lock().await.admin_log.clone()
    }
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

fn on_model_list(view: &ViewState) -> bool {
    view.location.contains("/nlu/models")
}

/// Affordance table for the fake workbench
///
/// Every selector the suites touch is listed here; unknown selectors are
/// simply absent. Visibility depends only on the permission set and the
/// current view.
fn visible(state: &AppState, view: &ViewState, perms: &[String], selector: &str) -> bool {
    let can_read = perms.iter().any(|p| p.starts_with("nlu-data:"));
    let has = |token: &str| perms.iter().any(|p| p == token);

    if let Some(name) = model_selector_name(selector) {
        return on_model_list(view) && state.models.values().any(|m| m.name == name);
    }

    match selector {
        s if s.contains(".open-model-button") || s.contains("button.primary") => {
            on_model_list(view) && !state.models.is_empty()
        }
        s if s.contains("button.secondary") => on_model_list(view) && has("nlu-model:w"),
        "[data-cy=new-model]" => on_model_list(view) && has("nlu-model:w"),
        ".nlu-menu-activity" | ".nlu-menu-training-data" | ".nlu-menu-evaluation"
        | ".nlu-menu-settings" => view.open_model.is_some() && can_read,
        "[data-cy=train-button]" => view.open_model.is_some() && has("nlu-data:x"),
        "[data-cy=select-training-button]" | "[data-cy=start-evaluation]" => {
            view.open_model.is_some() && has("nlu-data:x")
        }
        "#playground" | ".ReactTable" => view.open_model.is_some() && can_read,
        ".batch-insert-input" | ".file-dropzone" | "[data-cy=save-button]" => {
            view.open_model.is_some() && has("nlu-data:w")
        }
        ".stat-examples .value" | ".stat-intents .value" | ".stat-entities .value" => {
            view.open_model.is_some() && can_read
        }
        _ => false,
    }
}

/// Extract NAME from selectors of the form `#model-NAME .open-model-button`
fn model_selector_name(selector: &str) -> Option<&str> {
    let rest = selector.strip_prefix("#model-")?;
    let name = rest.split_whitespace().next()?;
    if rest.contains(".open-model-button") {
        Some(name)
    } else {
        None
    }
}

/// Merge a common-examples import payload into a model's statistics
fn apply_import(model: &mut ModelRecord, payload: &Value, overwrite: bool) {
    if overwrite {
        model.examples = 0;
        model.intents.clear();
        model.entities.clear();
    }
    let examples = payload["common_examples"].as_array();
    if let Some(examples) = examples {
        model.examples += examples.len();
        for example in examples {
            if let Some(intent) = example["intent"].as_str() {
                model.intents.insert(intent.to_string());
            }
            if let Some(entities) = example["entities"].as_array() {
                for entity in entities {
                    if let Some(name) = entity["entity"].as_str() {
                        model.entities.insert(name.to_string());
                    }
                }
            }
        }
    }
}

impl AppState {
    fn view(&self, session: &Session) -> Result<&ViewState> {
        self.sessions
            .get(&session.id)
            .ok_or_else(|| Error::Internal(format!("unknown session '{}'", session.id)))
    }

    fn view_mut(&mut self, session: &Session) -> Result<&mut ViewState> {
        self.sessions
            .get_mut(&session.id)
            .ok_or_else(|| Error::Internal(format!("unknown session '{}'", session.id)))
    }

    fn permissions_of(&self, email: &str) -> Vec<String> {
        self.users
            .get(email)
            .map(|u| u.permissions.clone())
            .unwrap_or_default()
    }

    fn first_model_id(&self) -> Option<String> {
        self.models.keys().next().cloned()
    }

    fn model_id_by_name(&self, name: &str) -> Option<String> {
        self.models
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl Target for MemoryTarget {
    async fn authenticate(&self, actor: &ActorSpec) -> Result<Session> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&actor.email) {
            return Err(Error::AuthenticationFailed {
                email: actor.email.clone(),
                reason: "no such account".to_string(),
            });
        }
        state.next_id += 1;
        let id = format!("session-{}", state.next_id);
        let token = format!("token-{}", state.next_id);
        state.sessions.insert(
            id.clone(),
            ViewState {
                email: actor.email.clone(),
                location: "/".to_string(),
                open_model: None,
                pending_input: None,
            },
        );
        Ok(Session {
            id,
            token,
            email: actor.email.clone(),
        })
    }

    async fn navigate(&self, session: &Session, locator: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let view = state.view_mut(session)?;
        view.location = locator.to_string();
        // a fresh page load closes whatever was open
        view.open_model = None;
        view.pending_input = None;
        Ok(())
    }

    async fn query_existence(&self, session: &Session, selector: &str) -> Result<bool> {
        let state = self.state.lock().await;
        let view = state.view(session)?;
        let perms = state.permissions_of(&view.email);
        Ok(visible(&state, view, &perms, selector))
    }

    async fn query_text(&self, session: &Session, selector: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        let view = state.view(session)?;
        let perms = state.permissions_of(&view.email);
        if !visible(&state, view, &perms, selector) {
            return Ok(None);
        }
        if selector == ".batch-insert-input" {
            return Ok(view.pending_input.clone());
        }
        let model = match &view.open_model {
            Some(id) => state.models.get(id),
            None => None,
        };
        let text = model.and_then(|m| match selector {
            ".stat-examples .value" => Some(m.examples.to_string()),
            ".stat-intents .value" => Some(m.intents.len().to_string()),
            ".stat-entities .value" => Some(m.entities.len().to_string()),
            _ => None,
        });
        Ok(text)
    }

    async fn interact(
        &self,
        session: &Session,
        selector: &str,
        action: Interaction,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let view = state.view(session)?;
        let perms = state.permissions_of(&view.email);
        if !visible(&state, view, &perms, selector) {
            return Err(Error::Internal(format!("no such element: {}", selector)));
        }

        match action {
            Interaction::Click => {
                let opened = if let Some(name) = model_selector_name(selector) {
                    state.model_id_by_name(name)
                } else if selector.contains(".open-model-button")
                    || selector.contains("button.primary")
                {
                    state.first_model_id()
                } else {
                    None
                };
                if let Some(id) = opened {
                    state.view_mut(session)?.open_model = Some(id);
                }
            }
            Interaction::Type { text } => {
                state.view_mut(session)?.pending_input = Some(text);
            }
            Interaction::Upload { content, .. } => {
                let payload: Value = serde_json::from_str(&content)
                    .map_err(|e| Error::Internal(format!("upload is not JSON: {}", e)))?;
                let open = state.view(session)?.open_model.clone();
                let id = open
                    .ok_or_else(|| Error::Internal("no model open for upload".to_string()))?;
                if let Some(model) = state.models.get_mut(&id) {
                    apply_import(model, &payload, true);
                }
            }
        }
        Ok(())
    }

    async fn invoke_remote_procedure(&self, method: &str, args: &[Value]) -> Result<Value> {
        let mut state = self.state.lock().await;
        match method {
            "users.create" => {
                let email = args
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::rpc_failed(method, "missing email"))?;
                if state.users.contains_key(email) {
                    return Err(Error::rpc_failed(
                        method,
                        &format!("duplicate-user: '{}' already exists", email),
                    ));
                }
                let permissions = args
                    .get(1)
                    .and_then(|v| v.as_array())
                    .map(|perms| {
                        perms
                            .iter()
                            .filter_map(|p| p.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                state
                    .users
                    .insert(email.to_string(), UserRecord { permissions });
                Ok(Value::String(email.to_string()))
            }
            "users.remove" => {
                let email = args
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::rpc_failed(method, "missing email"))?;
                if state.users.remove(email).is_none() {
                    return Err(Error::rpc_failed(
                        method,
                        &format!("not-found: no user '{}'", email),
                    ));
                }
                Ok(Value::Null)
            }
            "nlu.insert" => {
                let doc = args
                    .first()
                    .ok_or_else(|| Error::rpc_failed(method, "missing model document"))?;
                let name = doc["name"].as_str().unwrap_or("unnamed").to_string();
                state.next_id += 1;
                // zero-padded so BTreeMap order matches creation order
                let id = format!("model-{:04}", state.next_id);
                state.models.insert(
                    id.clone(),
                    ModelRecord {
                        name,
                        ..ModelRecord::default()
                    },
                );
                Ok(Value::String(id))
            }
            "nlu.remove" => {
                let id = args
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::rpc_failed(method, "missing model id"))?;
                if state.models.remove(id).is_none() {
                    return Err(Error::rpc_failed(
                        method,
                        &format!("not-found: no model '{}'", id),
                    ));
                }
                Ok(Value::Null)
            }
            "nlu.import" => {
                let payload = args
                    .first()
                    .ok_or_else(|| Error::rpc_failed(method, "missing payload"))?;
                let id = args
                    .get(1)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::rpc_failed(method, "missing model id"))?;
                let overwrite = args.get(2).and_then(|v| v.as_bool()).unwrap_or(false);
                let model = state
                    .models
                    .get_mut(id)
                    .ok_or_else(|| {
                        Error::rpc_failed(method, &format!("not-found: no model '{}'", id))
                    })?;
                apply_import(model, payload, overwrite);
                Ok(Value::Null)
            }
            _ => Err(Error::rpc_failed(method, "unknown method")),
        }
    }

    async fn load_fixture(&self, name: &str) -> Result<String> {
        if let Some(content) = self.fixtures.get(name) {
            return Ok(content.clone());
        }
        if let Some(dir) = &self.fixtures_dir {
            let path = dir.join(name);
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                return Ok(content);
            }
        }
        Err(Error::FixtureNotFound {
            name: name.to_string(),
            dir: self
                .fixtures_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "<in-memory>".to_string()),
        })
    }

    async fn exec_admin_command(&self, command: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.admin_log.push(command.to_string());
        // honor the one teardown convention suites use: remove by name
        if let Some(name) = extract_removed_name(command) {
            state.models.retain(|_, m| m.name != name);
        }
        Ok(())
    }
}

/// Pull NAME out of commands containing `name: 'NAME'`
fn extract_removed_name(command: &str) -> Option<String> {
    let start = command.find("name: '")? + "name: '".len();
    let end = command[start..].find('\'')? + start;
    Some(command[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(email: &str, permissions: &[&str]) -> ActorSpec {
        ActorSpec {
            email: email.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            password: None,
        }
    }

    async fn provisioned_target() -> (MemoryTarget, Session) {
        let target = MemoryTarget::new();
        target
            .invoke_remote_procedure(
                "users.create",
                &[
                    Value::String("w@test.ia".to_string()),
                    serde_json::json!(["nlu-data:w"]),
                    Value::String("p1".to_string()),
                ],
            )
            .await
            .unwrap();
        target
            .invoke_remote_procedure(
                "nlu.insert",
                &[serde_json::json!({"name": "myModel", "language": "en"})],
            )
            .await
            .unwrap();
        let session = target
            .authenticate(&actor("w@test.ia", &["nlu-data:w"]))
            .await
            .unwrap();
        (target, session)
    }

    #[tokio::test]
    async fn test_authentication_requires_account() {
        let target = MemoryTarget::new();
        let result = target.authenticate(&actor("ghost@test.ia", &[])).await;
        assert!(matches!(result, Err(Error::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_user_is_rejected() {
        let (target, _) = provisioned_target().await;
        let result = target
            .invoke_remote_procedure(
                "users.create",
                &[Value::String("w@test.ia".to_string()), serde_json::json!([])],
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::RpcFailed { message, .. }) if message.contains("duplicate-user")
        ));
    }

    #[tokio::test]
    async fn test_visibility_is_a_function_of_permissions() {
        let (target, session) = provisioned_target().await;
        target
            .navigate(&session, "/project/p1/nlu/models")
            .await
            .unwrap();
        target
            .interact(&session, ".cards > :first-child button.primary", Interaction::Click)
            .await
            .unwrap();

        assert!(target
            .query_existence(&session, ".nlu-menu-activity")
            .await
            .unwrap());
        // nlu-data:w does not include the train capability
        assert!(!target
            .query_existence(&session, "[data-cy=train-button]")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_navigation_closes_open_model() {
        let (target, session) = provisioned_target().await;
        target
            .navigate(&session, "/project/p1/nlu/models")
            .await
            .unwrap();
        target
            .interact(&session, ".cards > :first-child button.primary", Interaction::Click)
            .await
            .unwrap();
        assert!(target
            .query_existence(&session, ".nlu-menu-settings")
            .await
            .unwrap());

        target
            .navigate(&session, "/project/p1/nlu/models")
            .await
            .unwrap();
        assert!(!target
            .query_existence(&session, ".nlu-menu-settings")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_import_counts_examples_intents_entities() {
        let (target, _session) = provisioned_target().await;
        let payload = serde_json::json!({
            "common_examples": [
                {
                    "text": "Je m'appelle Matthieu",
                    "intent": "chitchat.presentation",
                    "entities": [{"start": 13, "end": 21, "value": "Matthieu", "entity": "name"}]
                }
            ],
            "entity_synonyms": [],
            "fuzzy_gazette": []
        });
        let id = target
            .invoke_remote_procedure("nlu.insert", &[serde_json::json!({"name": "m2"})])
            .await
            .unwrap();
        target
            .invoke_remote_procedure(
                "nlu.import",
                &[payload, id, Value::Bool(true)],
            )
            .await
            .unwrap();
        assert_eq!(target.model_stats("m2").await, Some((1, 1, 1)));
    }

    #[tokio::test]
    async fn test_typed_text_is_readable_back() {
        let (target, session) = provisioned_target().await;
        target
            .navigate(&session, "/project/p1/nlu/models")
            .await
            .unwrap();
        target
            .interact(&session, ".cards > :first-child button.primary", Interaction::Click)
            .await
            .unwrap();
        target
            .interact(
                &session,
                ".batch-insert-input",
                Interaction::Type {
                    text: "An intent".to_string(),
                },
            )
            .await
            .unwrap();
        let text = target
            .query_text(&session, ".batch-insert-input")
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("An intent"));
    }

    #[tokio::test]
    async fn test_admin_command_removes_by_name() {
        let (target, _) = provisioned_target().await;
        assert_eq!(target.model_names().await, vec!["myModel"]);
        target
            .exec_admin_command(
                "mongo meteor --host localhost:3001 --eval \"db.nlu_models.remove({ name: 'myModel'});\"",
            )
            .await
            .unwrap();
        assert!(target.model_names().await.is_empty());
        assert_eq!(target.admin_log().await.len(), 1);
    }
}
